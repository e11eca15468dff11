use std::ffi::OsString;
use std::fs::FileType;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, warn};

use super::cancel::CancelToken;
use super::detect::RepoDetector;
use super::ignore_stack::{IgnoreMatcher, MatcherStack};
use super::progress::{ProgressReporter, ProgressSink};
use super::types::{ScanOptions, ScanReport, SkipReason, SkippedDir};
use crate::types::DiscoveryError;

/// Entry name that marks a git working tree. A plain file counts too:
/// linked worktrees and submodules keep a gitfile there instead of a
/// directory.
const GIT_DIR: &str = ".git";

/// Always pruned, before any ignore rule gets a say.
const VENDOR_DIR: &str = "node_modules";

/// Depth-first traversal that stops at working trees and applies layered
/// `.gitignore` semantics on the way down.
///
/// A discovered repository ends the descent on that branch, so a checkout
/// nested inside another working tree is never reported separately.
pub struct DirectoryWalker<'a> {
    detector: &'a RepoDetector,
    options: &'a ScanOptions,
}

struct WalkState<'s> {
    report: ScanReport,
    progress: ProgressReporter<'s>,
    cancel: &'s CancelToken,
    max_depth: usize,
    include_hidden: bool,
}

impl<'a> DirectoryWalker<'a> {
    pub fn new(detector: &'a RepoDetector, options: &'a ScanOptions) -> Self {
        Self { detector, options }
    }

    /// Walks `root` and returns every repository found plus the skip
    /// ledger. A missing or non-directory root yields an empty report
    /// rather than an error.
    pub async fn walk(
        &self,
        root: &Path,
        sink: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<ScanReport, DiscoveryError> {
        let mut state = WalkState {
            report: ScanReport::default(),
            progress: ProgressReporter::new(sink),
            cancel,
            max_depth: self.options.max_depth.max(1),
            include_hidden: self.options.include_hidden,
        };

        // The UI learns the scan is alive before the first disk read.
        state.progress.report(0, 0, true);

        if root.is_dir() {
            let base = if self.options.extra_ignore_patterns.is_empty() {
                MatcherStack::new()
            } else {
                MatcherStack::with_base(IgnoreMatcher::from_patterns(
                    root,
                    &self.options.extra_ignore_patterns,
                )?)
            };
            self.visit(root.to_path_buf(), base, 0, &mut state).await;
        } else {
            warn!(root = %root.display(), "scan root is missing or not a directory");
        }

        state.report.cancelled = cancel.is_cancelled();
        let stats = state.report.stats;
        state
            .progress
            .report(stats.folders_scanned, stats.repos_found, true);
        Ok(state.report)
    }

    fn visit<'v>(
        &'v self,
        dir: PathBuf,
        stack: MatcherStack,
        depth: usize,
        state: &'v mut WalkState<'_>,
    ) -> BoxFuture<'v, ()> {
        async move {
            if state.cancel.is_cancelled() {
                return;
            }

            state.report.stats.folders_scanned += 1;
            let stats = state.report.stats;
            state
                .progress
                .report(stats.folders_scanned, stats.repos_found, false);

            // Rules found here bind this directory's whole subtree.
            let stack = stack.push(IgnoreMatcher::load(&dir));

            let mut reader = match tokio::fs::read_dir(&dir).await {
                Ok(reader) => reader,
                Err(err) => {
                    debug!(
                        dir = %dir.display(),
                        error = %err,
                        "directory unreadable, skipping subtree"
                    );
                    state.report.skipped.push(SkippedDir {
                        path: dir,
                        reason: SkipReason::Unreadable {
                            detail: err.to_string(),
                        },
                    });
                    return;
                }
            };

            let mut children: Vec<(OsString, FileType)> = Vec::new();
            let mut has_git = false;
            loop {
                match reader.next_entry().await {
                    Ok(Some(entry)) => {
                        let name = entry.file_name();
                        if name.to_str() == Some(GIT_DIR) {
                            has_git = true;
                        }
                        // file_type does not follow symlinks, so a link to a
                        // directory stays a link and is never descended into.
                        if let Ok(file_type) = entry.file_type().await {
                            children.push((name, file_type));
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        debug!(
                            dir = %dir.display(),
                            error = %err,
                            "directory listing failed mid-read, skipping subtree"
                        );
                        state.report.skipped.push(SkippedDir {
                            path: dir,
                            reason: SkipReason::Unreadable {
                                detail: err.to_string(),
                            },
                        });
                        return;
                    }
                }
            }

            if has_git {
                match self.detector.detect(&dir).await {
                    Ok(entry) => {
                        state.report.repos.push(entry);
                        state.report.stats.repos_found += 1;
                        let stats = state.report.stats;
                        state
                            .progress
                            .report(stats.folders_scanned, stats.repos_found, true);
                    }
                    Err(err) => {
                        warn!(
                            dir = %dir.display(),
                            error = %err,
                            "git queries failed for discovered repository"
                        );
                        state.report.skipped.push(SkippedDir {
                            path: dir,
                            reason: SkipReason::GitQuery {
                                detail: err.to_string(),
                            },
                        });
                    }
                }
                // A working tree is a leaf of the walk.
                return;
            }

            if depth >= state.max_depth {
                return;
            }

            children.sort_by(|a, b| a.0.cmp(&b.0));
            for (name, file_type) in children {
                if !file_type.is_dir() {
                    continue;
                }
                let display = name.to_string_lossy();
                if display == VENDOR_DIR {
                    continue;
                }
                if !state.include_hidden && display.starts_with('.') {
                    continue;
                }
                let child = dir.join(&name);
                if stack.is_ignored(&child, true) {
                    continue;
                }
                self.visit(child, stack.clone(), depth + 1, &mut *state).await;
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockGitClient;
    use crate::scanner::progress::NullSink;
    use std::sync::Arc;

    fn quiet_detector() -> RepoDetector {
        let mut git = MockGitClient::new();
        git.expect_status().returning(|_| Ok(Vec::new()));
        git.expect_current_branch()
            .returning(|_| Ok("main".to_string()));
        git.expect_last_commit_subject()
            .returning(|_| Ok(Some("init".to_string())));
        RepoDetector::new(Arc::new(git))
    }

    #[tokio::test]
    async fn test_missing_root_yields_an_empty_report() {
        let detector = quiet_detector();
        let options = ScanOptions::default();
        let walker = DirectoryWalker::new(&detector, &options);

        let report = walker
            .walk(
                Path::new("/definitely/not/a/real/path"),
                &NullSink,
                &CancelToken::new(),
            )
            .await
            .unwrap();

        assert!(report.repos.is_empty());
        assert_eq!(report.stats.folders_scanned, 0);
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_stops_before_any_read() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("child")).unwrap();

        let detector = quiet_detector();
        let options = ScanOptions::default();
        let walker = DirectoryWalker::new(&detector, &options);

        let cancel = CancelToken::new();
        cancel.cancel();
        let report = walker.walk(tmp.path(), &NullSink, &cancel).await.unwrap();

        assert!(report.cancelled);
        assert_eq!(report.stats.folders_scanned, 0);
    }

    #[tokio::test]
    async fn test_root_that_is_a_repo_is_reported_without_descent() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join(".git")).unwrap();
        std::fs::create_dir(tmp.path().join("src")).unwrap();

        let detector = quiet_detector();
        let options = ScanOptions::default();
        let walker = DirectoryWalker::new(&detector, &options);

        let report = walker
            .walk(tmp.path(), &NullSink, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(report.repos.len(), 1);
        assert_eq!(report.stats.folders_scanned, 1);
        assert_eq!(report.stats.repos_found, 1);
    }

    #[tokio::test]
    async fn test_gitfile_marks_a_working_tree() {
        let tmp = tempfile::TempDir::new().unwrap();
        let wt = tmp.path().join("linked");
        std::fs::create_dir(&wt).unwrap();
        std::fs::write(wt.join(".git"), "gitdir: /elsewhere/.git/worktrees/linked\n").unwrap();

        let detector = quiet_detector();
        let options = ScanOptions::default();
        let walker = DirectoryWalker::new(&detector, &options);

        let report = walker
            .walk(tmp.path(), &NullSink, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(report.repos.len(), 1);
        assert_eq!(report.repos[0].name, "linked");
    }
}
