//! Filesystem traversal: the walker itself, layered ignore handling,
//! throttled progress, repository detection, and cancellation.

pub mod cancel;
pub mod detect;
pub mod ignore_stack;
pub mod progress;
pub mod types;
pub mod walker;

pub use cancel::CancelToken;
pub use detect::{RepoDetector, FRESH_SUMMARY, NO_COMMITS};
pub use ignore_stack::{IgnoreMatcher, MatcherStack, GITIGNORE_FILE};
pub use progress::{ChannelSink, NullSink, ProgressEvent, ProgressReporter, ProgressSink};
pub use types::{ScanOptions, ScanReport, ScanStats, SkipReason, SkippedDir, DEFAULT_MAX_DEPTH};
pub use walker::DirectoryWalker;
