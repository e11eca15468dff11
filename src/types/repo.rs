use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Working-tree cleanliness of a discovered repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepoStatus {
    Clean,
    Uncommitted,
}

impl fmt::Display for RepoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoStatus::Clean => write!(f, "Clean"),
            RepoStatus::Uncommitted => write!(f, "Uncommitted"),
        }
    }
}

/// A repository found on disk, in the shape dashboard frontends consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoEntry {
    /// Directory name of the working tree.
    pub name: String,
    /// Absolute path to the working tree.
    pub path: PathBuf,
    pub status: RepoStatus,
    /// Abbreviated name of the checked-out branch.
    pub branch: String,
    /// Subject line of the newest commit, or a sentinel for empty history.
    pub last_commit: String,
    /// Human-readable blurb; starts as a placeholder until a summary runs.
    pub summary: String,
}

/// How a path in the working tree changed relative to HEAD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileChangeKind {
    Added,
    Deleted,
    Modified,
}

impl fmt::Display for FileChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileChangeKind::Added => write!(f, "added"),
            FileChangeKind::Deleted => write!(f, "deleted"),
            FileChangeKind::Modified => write!(f, "modified"),
        }
    }
}

/// One changed path from the working-tree delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    #[serde(rename = "name")]
    pub path: String,
    #[serde(rename = "status")]
    pub kind: FileChangeKind,
}

/// One commit from the recent-history view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Abbreviated hash.
    pub id: String,
    /// Subject line.
    pub message: String,
    /// Author date, ISO formatted.
    pub time: String,
    pub author: String,
}

/// Drill-down view for a single repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoDetails {
    pub commits: Vec<CommitInfo>,
    pub files: Vec<ChangedFile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_entry_serializes_with_camel_case_keys() {
        let entry = RepoEntry {
            name: "rempo".to_string(),
            path: PathBuf::from("/home/dev/rempo"),
            status: RepoStatus::Clean,
            branch: "main".to_string(),
            last_commit: "Initial commit".to_string(),
            summary: "Repository found on disk.".to_string(),
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["lastCommit"], "Initial commit");
        assert_eq!(json["status"], "Clean");
        assert!(json.get("last_commit").is_none());
    }

    #[test]
    fn test_changed_file_uses_wire_field_names() {
        let file = ChangedFile {
            path: "src/lib.rs".to_string(),
            kind: FileChangeKind::Modified,
        };

        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["name"], "src/lib.rs");
        assert_eq!(json["status"], "modified");
    }

    #[test]
    fn test_repo_entry_round_trips_through_json() {
        let entry = RepoEntry {
            name: "api".to_string(),
            path: PathBuf::from("/srv/api"),
            status: RepoStatus::Uncommitted,
            branch: "feature/login".to_string(),
            last_commit: "No commits".to_string(),
            summary: "Repository found on disk.".to_string(),
        };

        let json = serde_json::to_string(&entry).unwrap();
        let back: RepoEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
