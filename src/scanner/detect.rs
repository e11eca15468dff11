use std::path::Path;
use std::sync::Arc;

use crate::git::GitClient;
use crate::types::{GitError, RepoEntry, RepoStatus};

/// Summary attached to a freshly discovered repository before any AI pass.
pub const FRESH_SUMMARY: &str = "Repository found on disk.";

/// Sentinel shown for a repository with no history yet.
pub const NO_COMMITS: &str = "No commits";

/// Turns a directory confirmed to contain a `.git` entry into a
/// [`RepoEntry`] by asking the git collaborator three questions: the
/// working-tree delta, the current branch, and the newest commit subject.
pub struct RepoDetector {
    git: Arc<dyn GitClient>,
}

impl RepoDetector {
    pub fn new(git: Arc<dyn GitClient>) -> Self {
        Self { git }
    }

    pub async fn detect(&self, dir: &Path) -> Result<RepoEntry, GitError> {
        let changes = self.git.status(dir).await?;
        let branch = self.git.current_branch(dir).await?;
        let subject = self.git.last_commit_subject(dir).await?;

        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());

        Ok(RepoEntry {
            name,
            path: dir.to_path_buf(),
            status: if changes.is_empty() {
                RepoStatus::Clean
            } else {
                RepoStatus::Uncommitted
            },
            branch,
            last_commit: subject.unwrap_or_else(|| NO_COMMITS.to_string()),
            summary: FRESH_SUMMARY.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockGitClient;
    use crate::types::{ChangedFile, FileChangeKind};
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_clean_tree_maps_to_clean_status() {
        let mut git = MockGitClient::new();
        git.expect_status().returning(|_| Ok(Vec::new()));
        git.expect_current_branch()
            .returning(|_| Ok("main".to_string()));
        git.expect_last_commit_subject()
            .returning(|_| Ok(Some("Fix flaky test".to_string())));

        let detector = RepoDetector::new(Arc::new(git));
        let entry = detector.detect(Path::new("/work/api")).await.unwrap();

        assert_eq!(entry.name, "api");
        assert_eq!(entry.path, PathBuf::from("/work/api"));
        assert_eq!(entry.status, RepoStatus::Clean);
        assert_eq!(entry.branch, "main");
        assert_eq!(entry.last_commit, "Fix flaky test");
        assert_eq!(entry.summary, FRESH_SUMMARY);
    }

    #[tokio::test]
    async fn test_any_change_maps_to_uncommitted() {
        let mut git = MockGitClient::new();
        git.expect_status().returning(|_| {
            Ok(vec![ChangedFile {
                path: "src/lib.rs".to_string(),
                kind: FileChangeKind::Modified,
            }])
        });
        git.expect_current_branch()
            .returning(|_| Ok("develop".to_string()));
        git.expect_last_commit_subject()
            .returning(|_| Ok(Some("wip".to_string())));

        let detector = RepoDetector::new(Arc::new(git));
        let entry = detector.detect(Path::new("/work/api")).await.unwrap();

        assert_eq!(entry.status, RepoStatus::Uncommitted);
    }

    #[tokio::test]
    async fn test_empty_history_uses_the_sentinel() {
        let mut git = MockGitClient::new();
        git.expect_status().returning(|_| Ok(Vec::new()));
        git.expect_current_branch()
            .returning(|_| Ok("main".to_string()));
        git.expect_last_commit_subject().returning(|_| Ok(None));

        let detector = RepoDetector::new(Arc::new(git));
        let entry = detector.detect(Path::new("/work/fresh")).await.unwrap();

        assert_eq!(entry.last_commit, NO_COMMITS);
    }

    #[tokio::test]
    async fn test_git_failure_propagates() {
        let mut git = MockGitClient::new();
        git.expect_status().returning(|_| {
            Err(GitError::CommandFailed {
                command: "status --porcelain".to_string(),
                code: 128,
                stderr: "not a git repository".to_string(),
            })
        });

        let detector = RepoDetector::new(Arc::new(git));
        let result = detector.detect(Path::new("/work/broken")).await;

        assert!(result.is_err());
    }
}
