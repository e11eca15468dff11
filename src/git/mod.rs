//! The external git collaborator: a trait describing the questions we ask
//! of a working tree, plus the subprocess-backed implementation.

pub mod cli;

pub use cli::GitCli;

use std::path::Path;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::types::{ChangedFile, CommitInfo, GitError};

type Result<T> = std::result::Result<T, GitError>;

/// Queries answered for a directory confirmed to be a git working tree.
///
/// Everything is read-only; nothing here ever mutates a repository.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GitClient: Send + Sync {
    /// Working-tree delta, one entry per changed path.
    async fn status(&self, dir: &Path) -> Result<Vec<ChangedFile>>;

    /// Abbreviated name of the checked-out branch.
    async fn current_branch(&self, dir: &Path) -> Result<String>;

    /// Subject line of the newest commit, or `None` for empty history.
    async fn last_commit_subject(&self, dir: &Path) -> Result<Option<String>>;

    /// Newest `max` commits, newest first. Empty history yields an empty
    /// list rather than an error.
    async fn recent_commits(&self, dir: &Path, max: usize) -> Result<Vec<CommitInfo>>;

    /// Fetch URL of `origin`, or of the first remote when there is no
    /// origin. `None` when the repository has no remotes at all.
    async fn remote_url(&self, dir: &Path) -> Result<Option<String>>;
}

/// Rewrites an SSH-style GitHub remote into the https form a browser can
/// open, and strips a trailing `.git` either way.
pub fn normalize_remote_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("git@github.com:") {
        let rest = rest.strip_suffix(".git").unwrap_or(rest);
        return format!("https://github.com/{rest}");
    }
    url.strip_suffix(".git").unwrap_or(url).to_string()
}
