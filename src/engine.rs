use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::git::{GitCli, GitClient};
use crate::scanner::{
    CancelToken, DirectoryWalker, NullSink, ProgressSink, RepoDetector, ScanOptions, ScanReport,
};
use crate::storage::{MemoryCache, ScanCache, ScanCacheEntry};
use crate::types::DiscoveryError;

static NULL_SINK: NullSink = NullSink;

/// One scan invocation: options plus the cache, progress, and cancellation
/// wiring for this particular call.
pub struct ScanRequest<'a> {
    pub options: ScanOptions,
    /// Walk the tree even when a usable cache entry exists.
    pub refresh: bool,
    pub sink: &'a dyn ProgressSink,
    pub cancel: CancelToken,
}

impl Default for ScanRequest<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanRequest<'static> {
    pub fn new() -> Self {
        Self {
            options: ScanOptions::default(),
            refresh: false,
            sink: &NULL_SINK,
            cancel: CancelToken::new(),
        }
    }
}

impl<'a> ScanRequest<'a> {
    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn with_sink<'b>(self, sink: &'b dyn ProgressSink) -> ScanRequest<'b> {
        ScanRequest {
            options: self.options,
            refresh: self.refresh,
            sink,
            cancel: self.cancel,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// The discovery facade: wires the walker, the git collaborator, and the
/// scan cache together behind one `scan` call.
///
/// ```no_run
/// use rempo::DiscoveryEngine;
///
/// # async fn example() -> Result<(), rempo::DiscoveryError> {
/// let engine = DiscoveryEngine::builder().max_depth(4).build()?;
/// let report = engine.scan(std::path::Path::new("/home/dev/src")).await?;
/// for repo in &report.repos {
///     println!("{} on {}", repo.name, repo.branch);
/// }
/// # Ok(())
/// # }
/// ```
pub struct DiscoveryEngine {
    git: Arc<dyn GitClient>,
    cache: Arc<dyn ScanCache>,
    defaults: ScanOptions,
    in_flight: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl DiscoveryEngine {
    pub fn builder() -> DiscoveryEngineBuilder {
        DiscoveryEngineBuilder::new()
    }

    pub fn default_options(&self) -> &ScanOptions {
        &self.defaults
    }

    /// Scans with the engine's default options, no progress consumer, and
    /// caching enabled.
    pub async fn scan(&self, root: &Path) -> Result<ScanReport, DiscoveryError> {
        let request = ScanRequest::new().with_options(self.defaults.clone());
        self.scan_with(root, request).await
    }

    pub async fn scan_with(
        &self,
        root: &Path,
        request: ScanRequest<'_>,
    ) -> Result<ScanReport, DiscoveryError> {
        let key = normalize_root(root);
        let root_exists = key.is_dir();

        // One walk per root at a time. A second caller for the same root
        // waits here and is then served the winner's cache entry instead of
        // racing it to a duplicate walk.
        let gate = {
            let slot = self.in_flight.entry(key.clone()).or_default();
            Arc::clone(slot.value())
        };
        let _guard = gate.lock().await;

        if !request.refresh {
            if let Some(entry) = self.cache.get(&key) {
                if !entry.repos.is_empty() {
                    debug!(
                        root = %key.display(),
                        repos = entry.repos.len(),
                        "serving cached scan"
                    );
                    return Ok(ScanReport::from_cache(entry.repos));
                }
            }
        }

        info!(root = %key.display(), refresh = request.refresh, "scanning");
        let detector = RepoDetector::new(Arc::clone(&self.git));
        let walker = DirectoryWalker::new(&detector, &request.options);
        let report = walker.walk(&key, request.sink, &request.cancel).await?;

        if report.cancelled {
            debug!(root = %key.display(), "scan cancelled, cache left untouched");
        } else if root_exists {
            self.cache.put(&key, ScanCacheEntry::now(report.repos.clone()));
        }
        info!(
            root = %key.display(),
            repos = report.repos.len(),
            folders = report.stats.folders_scanned,
            cancelled = report.cancelled,
            "scan finished"
        );
        Ok(report)
    }

    /// Cached entry for a root, if any, without walking anything.
    pub fn cached(&self, root: &Path) -> Option<ScanCacheEntry> {
        self.cache.get(&normalize_root(root))
    }
}

/// Symlinks and `..` segments collapse to one canonical key, so `/work`
/// and `/work/../work` share a cache entry and an in-flight slot.
fn normalize_root(root: &Path) -> PathBuf {
    root.canonicalize().unwrap_or_else(|_| root.to_path_buf())
}

/// Builder for [`DiscoveryEngine`].
///
/// Defaults: subprocess-backed git client, in-memory cache, stock scan
/// options.
pub struct DiscoveryEngineBuilder {
    git: Option<Arc<dyn GitClient>>,
    cache: Option<Arc<dyn ScanCache>>,
    defaults: ScanOptions,
}

impl Default for DiscoveryEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryEngineBuilder {
    pub fn new() -> Self {
        Self {
            git: None,
            cache: None,
            defaults: ScanOptions::default(),
        }
    }

    pub fn git_client(mut self, git: Arc<dyn GitClient>) -> Self {
        self.git = Some(git);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn ScanCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.defaults.max_depth = max_depth;
        self
    }

    pub fn include_hidden(mut self, include_hidden: bool) -> Self {
        self.defaults.include_hidden = include_hidden;
        self
    }

    pub fn extra_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.defaults.extra_ignore_patterns = patterns;
        self
    }

    pub fn scan_options(mut self, options: ScanOptions) -> Self {
        self.defaults = options;
        self
    }

    /// Validates the default options and assembles the engine. The only
    /// thing that can go wrong today is a malformed extra ignore pattern.
    pub fn build(self) -> Result<DiscoveryEngine, DiscoveryError> {
        if !self.defaults.extra_ignore_patterns.is_empty() {
            crate::scanner::IgnoreMatcher::from_patterns(
                Path::new("/"),
                &self.defaults.extra_ignore_patterns,
            )?;
        }
        Ok(DiscoveryEngine {
            git: self.git.unwrap_or_else(|| Arc::new(GitCli::new())),
            cache: self.cache.unwrap_or_else(|| Arc::new(MemoryCache::new())),
            defaults: self.defaults,
            in_flight: DashMap::new(),
        })
    }
}
