use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::RepoEntry;

/// Deepest directory level visited below the scan root when the caller
/// doesn't say otherwise.
pub const DEFAULT_MAX_DEPTH: usize = 6;

/// Per-call scanning options. Defaults mirror the dashboard's stock
/// settings: depth six, hidden directories skipped, no extra patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScanOptions {
    /// Directory levels to descend below the root. The root itself is
    /// always visited; values below 1 are treated as 1.
    pub max_depth: usize,
    /// Visit dot-prefixed directories.
    pub include_hidden: bool,
    /// Extra gitignore-syntax patterns, applied beneath every on-disk
    /// `.gitignore` so those can still override them.
    pub extra_ignore_patterns: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            include_hidden: false,
            extra_ignore_patterns: Vec::new(),
        }
    }
}

impl ScanOptions {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn include_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    pub fn with_extra_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.extra_ignore_patterns = patterns;
        self
    }
}

/// Tallies threaded through the recursion and returned with the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub folders_scanned: u64,
    pub repos_found: u64,
}

/// Why a directory was left out of the walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SkipReason {
    /// The directory could not be listed (permissions, vanished mid-walk).
    Unreadable { detail: String },
    /// A confirmed repository whose git queries failed.
    GitQuery { detail: String },
}

/// One skipped directory, recorded instead of aborting the walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDir {
    pub path: PathBuf,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Outcome of one scan: discovered repositories plus the walk ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub repos: Vec<RepoEntry>,
    pub stats: ScanStats,
    pub skipped: Vec<SkippedDir>,
    /// True when the walk stopped early on a cancellation signal.
    pub cancelled: bool,
    /// True when the repository list was served from the scan cache
    /// without touching the filesystem.
    pub from_cache: bool,
}

impl ScanReport {
    /// Report shape for a cache hit: cached entries, no walk evidence.
    pub(crate) fn from_cache(repos: Vec<RepoEntry>) -> Self {
        let repos_found = repos.len() as u64;
        Self {
            repos,
            stats: ScanStats {
                folders_scanned: 0,
                repos_found,
            },
            skipped: Vec::new(),
            cancelled: false,
            from_cache: true,
        }
    }
}
