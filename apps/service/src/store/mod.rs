/// Persistent object store
///
/// Records are JSON documents addressed by `(collection, id)`. The worker only
/// reads, updates and lists the `checks` collection; creation and deletion
/// belong to whoever manages the records.

pub mod fs;
pub mod memory;

pub use fs::FsObjectStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub const CHECKS: &str = "checks";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record {collection}/{id} already exists")]
    AlreadyExists { collection: String, id: String },

    #[error("Record {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("Invalid record key '{0}'")]
    InvalidKey(String),

    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn not_found(collection: &str, id: &str) -> Self {
        Self::NotFound { collection: collection.to_string(), id: id.to_string() }
    }

    pub(crate) fn already_exists(collection: &str, id: &str) -> Self {
        Self::AlreadyExists { collection: collection.to_string(), id: id.to_string() }
    }
}

/// Key-value store of JSON records
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fails with [`StoreError::AlreadyExists`] if the record is present
    async fn create(&self, collection: &str, id: &str, record: &Value) -> Result<(), StoreError>;

    /// Fails with [`StoreError::NotFound`] if the record is absent
    async fn read(&self, collection: &str, id: &str) -> Result<Value, StoreError>;

    /// Fails with [`StoreError::NotFound`] if the record is absent
    async fn update(&self, collection: &str, id: &str, record: &Value) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// All ids in a collection; an unknown collection is empty
    async fn list(&self, collection: &str) -> Result<Vec<String>, StoreError>;
}

pub(crate) fn ensure_valid_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || key.contains(['/', '\\']) || key.contains("..") {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
