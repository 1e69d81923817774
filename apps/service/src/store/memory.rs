use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{ObjectStore, StoreError};

/// In-process store, mainly for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn create(&self, collection: &str, id: &str, record: &Value) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let records = collections.entry(collection.to_string()).or_default();
        if records.contains_key(id) {
            return Err(StoreError::already_exists(collection, id));
        }
        records.insert(id.to_string(), record.clone());
        Ok(())
    }

    async fn read(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        self.collections
            .read()
            .await
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned()
            .ok_or_else(|| StoreError::not_found(collection, id))
    }

    async fn update(&self, collection: &str, id: &str, record: &Value) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let slot = collections
            .get_mut(collection)
            .and_then(|records| records.get_mut(id))
            .ok_or_else(|| StoreError::not_found(collection, id))?;
        *slot = record.clone();
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.collections
            .write()
            .await
            .get_mut(collection)
            .and_then(|records| records.remove(id))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(collection, id))
    }

    async fn list(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|records| records.keys().cloned().collect())
            .unwrap_or_default())
    }
}
