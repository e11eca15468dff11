// Integration test for the public API
use std::path::PathBuf;

use rempo::{
    CancelToken, ChannelSink, DiscoveryEngine, DiscoveryEngineBuilder, DiscoveryError,
    ProgressEvent, RepoEntry, RepoStatus, ScanOptions, ScanRequest, DEFAULT_MAX_DEPTH,
};

#[test]
fn test_public_api_exports() {
    // Test that the core types are reachable from the crate root
    let _options: ScanOptions = ScanOptions::default();
    let _builder: DiscoveryEngineBuilder = DiscoveryEngine::builder();
    let _cancel: CancelToken = CancelToken::new();
    let (_sink, _rx) = ChannelSink::new();
    let _event = ProgressEvent {
        folders_scanned: 0,
        repos_found: 0,
    };
}

#[test]
fn test_builder_configuration() {
    let engine = DiscoveryEngine::builder()
        .max_depth(4)
        .include_hidden(true)
        .extra_ignore_patterns(vec!["target/".to_string()])
        .build();
    assert!(engine.is_ok());

    let engine = engine.unwrap();
    assert_eq!(engine.default_options().max_depth, 4);
    assert!(engine.default_options().include_hidden);
}

#[test]
fn test_invalid_patterns_are_rejected_at_build_time() {
    let result = DiscoveryEngine::builder()
        .extra_ignore_patterns(vec!["bad[".to_string()])
        .build();
    assert!(matches!(result, Err(DiscoveryError::InvalidPattern { .. })));
}

#[test]
fn test_default_options() {
    let options = ScanOptions::default();
    assert_eq!(options.max_depth, DEFAULT_MAX_DEPTH);
    assert!(!options.include_hidden);
    assert!(options.extra_ignore_patterns.is_empty());
}

#[tokio::test]
async fn test_scan_request_wiring() {
    let (sink, _rx) = ChannelSink::new();
    let cancel = CancelToken::new();
    let request = ScanRequest::new()
        .with_options(ScanOptions::default().with_max_depth(2))
        .refresh(true)
        .with_sink(&sink)
        .with_cancel(cancel.clone());

    assert!(request.refresh);
    assert_eq!(request.options.max_depth, 2);
    cancel.cancel();
    assert!(request.cancel.is_cancelled());
}

#[test]
fn test_repo_entry_wire_shape() {
    let entry = RepoEntry {
        name: "api".to_string(),
        path: PathBuf::from("/srv/api"),
        status: RepoStatus::Uncommitted,
        branch: "main".to_string(),
        last_commit: "Fix pagination".to_string(),
        summary: "Repository found on disk.".to_string(),
    };

    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["name"], "api");
    assert_eq!(json["status"], "Uncommitted");
    assert_eq!(json["lastCommit"], "Fix pagination");
}

#[tokio::test]
async fn test_full_workflow_on_an_empty_tree() {
    // No git invocations happen for a tree without repositories, so the
    // stock subprocess-backed engine is safe to use here.
    let tmp = tempfile::TempDir::new().unwrap();
    let engine = DiscoveryEngine::builder().build().unwrap();

    let report = engine.scan(tmp.path()).await.unwrap();
    assert!(report.repos.is_empty());
    assert_eq!(report.stats.folders_scanned, 1);
    assert!(!report.cancelled);
    assert!(!report.from_cache);

    // An empty entry never satisfies a cache lookup, so the second scan
    // walks again instead of pinning the root to an empty list.
    let again = engine.scan(tmp.path()).await.unwrap();
    assert!(!again.from_cache);
}
