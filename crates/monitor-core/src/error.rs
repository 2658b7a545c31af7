use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the session monitor.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// A session state file could not be decoded into a record.
    #[error("Failed to decode session record: {0}")]
    Decode(String),

    /// The session directory or one of its files could not be accessed.
    #[error("Session store I/O error at {path}: {source}")]
    StoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A session identifier cannot be used as a storage key.
    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),

    /// The batched terminal liveness query failed.
    #[error("Liveness query failed: {0}")]
    LivenessQuery(String),

    /// A single process could not be inspected during discovery.
    #[error("Cannot inspect process {pid}: {reason}")]
    DiscoveryProcess { pid: u32, reason: String },

    /// A JSON document could not be parsed or produced.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The process table could not be listed.
    #[error("Process listing failed: {0}")]
    ProcessList(String),

    /// A background worker panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the monitor crates.
pub type Result<T> = std::result::Result<T, MonitorError>;
