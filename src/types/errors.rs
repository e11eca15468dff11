use std::path::PathBuf;

use thiserror::Error;

/// Errors from one invocation of the external `git` binary.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to spawn git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("git {command} timed out after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },

    #[error("git {command} exited with code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("unexpected output from git {command}: {detail}")]
    Parse { command: String, detail: String },
}

/// Errors while persisting or encoding the on-disk store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write store at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode store: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors while producing an AI summary for a repository.
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("AI summaries are disabled in the configuration")]
    Disabled,

    #[error("no API key configured (set ai.api_key or GROQ_API_KEY)")]
    MissingApiKey,

    #[error("summary request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("summary API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error(transparent)]
    Git(#[from] GitError),
}

/// Top-level error for scan operations.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid ignore pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: ignore::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Summary(#[from] SummaryError),
}
