use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::{ObjectStore, StoreError, ensure_valid_key};

/// One pretty-printed JSON file per record: `<root>/<collection>/<id>.json`
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn collection_dir(&self, collection: &str) -> Result<PathBuf, StoreError> {
        ensure_valid_key(collection)?;
        Ok(self.root.join(collection))
    }

    fn record_path(&self, collection: &str, id: &str) -> Result<PathBuf, StoreError> {
        ensure_valid_key(id)?;
        Ok(self.collection_dir(collection)?.join(format!("{id}.json")))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn create(&self, collection: &str, id: &str, record: &Value) -> Result<(), StoreError> {
        let path = self.record_path(collection, id)?;
        fs::create_dir_all(self.collection_dir(collection)?).await?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => StoreError::already_exists(collection, id),
                _ => StoreError::Io(e),
            })?;

        file.write_all(&serde_json::to_vec_pretty(record)?).await?;
        file.flush().await?;
        Ok(())
    }

    async fn read(&self, collection: &str, id: &str) -> Result<Value, StoreError> {
        let path = self.record_path(collection, id)?;
        let raw = fs::read(&path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::not_found(collection, id),
            _ => StoreError::Io(e),
        })?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn update(&self, collection: &str, id: &str, record: &Value) -> Result<(), StoreError> {
        let path = self.record_path(collection, id)?;
        let body = serde_json::to_vec_pretty(record)?;

        fs::metadata(&path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::not_found(collection, id),
            _ => StoreError::Io(e),
        })?;

        // The record is replaced by rename, so readers see either version whole.
        let staging = path.with_extension("json.tmp");
        let written = async {
            let mut file =
                OpenOptions::new().write(true).create(true).truncate(true).open(&staging).await?;
            file.write_all(&body).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&staging).await;
            return Err(StoreError::Io(e));
        }

        fs::rename(&staging, &path).await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let path = self.record_path(collection, id)?;
        fs::remove_file(&path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::not_found(collection, id),
            _ => StoreError::Io(e),
        })
    }

    async fn list(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.collection_dir(collection)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(id) = entry.file_name().to_str().and_then(|name| name.strip_suffix(".json")) {
                ids.push(id.to_string());
            }
        }

        ids.sort();
        Ok(ids)
    }
}
