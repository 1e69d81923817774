//! Per-check evaluation logs.
//!
//! Every evaluation appends one JSON line to the active log of its check
//! (`<id>.log`). Rotation compresses an active log into an immutable archive
//! (`<archive id>.gz.b64`) and only then truncates it.

use std::io;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::monitoring::types::LogEntry;

pub mod file;
pub mod rotation;

pub use file::FileLogStore;
pub use rotation::{LogRotator, RotationReport};

pub const ACTIVE_SUFFIX: &str = ".log";
pub const ARCHIVE_SUFFIX: &str = ".gz.b64";

#[derive(Debug, Error)]
pub enum LogStoreError {
    #[error("Invalid log id '{0}'")]
    InvalidId(String),

    #[error("Log '{0}' not found")]
    NotFound(String),

    #[error("Log '{0}' is empty")]
    Empty(String),

    #[error("Archive '{0}' already exists")]
    ArchiveExists(String),

    #[error("I/O error on log '{id}': {source}")]
    Io {
        id: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode log entry: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Archive '{id}' is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Compression task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Append-only storage for evaluation logs
#[async_trait]
pub trait LogStorage: Send + Sync {
    /// Append one entry to the active log of `id`, creating it if needed
    async fn append(&self, id: &str, entry: &LogEntry) -> Result<(), LogStoreError>;

    /// Active log ids, plus archive ids when `include_archived` is set
    async fn list(&self, include_archived: bool) -> Result<Vec<String>, LogStoreError>;

    /// Write the active log of `id` to a new archive; never overwrites
    async fn compress(&self, id: &str, archive_id: &str) -> Result<(), LogStoreError>;

    /// Read an archive back as text
    async fn decompress(&self, archive_id: &str) -> Result<String, LogStoreError>;

    /// Empty the active log of `id`
    async fn truncate(&self, id: &str) -> Result<(), LogStoreError>;

    /// Archive the active log of `id`, then empty it.
    ///
    /// The log is only truncated once the archive is written. Implementations
    /// that accept concurrent appends must keep them out of the window between
    /// the two steps.
    async fn rotate(&self, id: &str, archive_id: &str) -> Result<(), LogStoreError> {
        self.compress(id, archive_id).await?;
        self.truncate(id).await
    }
}

/// `<id>-<epoch millis>-<sequence>`
pub fn archive_id(id: &str, at: DateTime<Utc>, sequence: u64) -> String {
    format!("{id}-{}-{sequence}", at.timestamp_millis())
}

/// Reject ids that could escape the log directory
pub(crate) fn ensure_safe_id(id: &str) -> Result<(), LogStoreError> {
    let unsafe_id = id.is_empty()
        || id.contains('/')
        || id.contains('\\')
        || id.contains("..")
        || id.chars().any(char::is_control);

    if unsafe_id { Err(LogStoreError::InvalidId(id.to_string())) } else { Ok(()) }
}
