pub mod cli;
pub mod cli_types;
pub mod config;
pub mod engine;
pub mod git;
pub mod scanner;
pub mod storage;
pub mod summary;
pub mod types;

// Re-export commonly used types
pub use types::*;
pub use cli::CliApp;
pub use config::AppConfig;
pub use engine::{DiscoveryEngine, DiscoveryEngineBuilder, ScanRequest};
pub use git::{normalize_remote_url, GitCli, GitClient};
pub use scanner::{
    CancelToken, ChannelSink, DirectoryWalker, NullSink, ProgressEvent, ProgressSink, ScanOptions,
    ScanReport, ScanStats, DEFAULT_MAX_DEPTH,
};
pub use storage::{JsonStore, MemoryCache, ScanCache, ScanCacheEntry, StoreData};
pub use summary::{GroqClient, SummaryEngine, SummaryProvider};
