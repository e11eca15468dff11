pub mod errors;
pub mod repo;

pub use errors::{DiscoveryError, GitError, StoreError, SummaryError};
pub use repo::{ChangedFile, CommitInfo, FileChangeKind, RepoDetails, RepoEntry, RepoStatus};
