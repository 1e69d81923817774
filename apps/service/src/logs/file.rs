use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::OwnedMutexGuard;

use super::{ACTIVE_SUFFIX, ARCHIVE_SUFFIX, LogStorage, LogStoreError, ensure_safe_id};
use crate::monitoring::types::LogEntry;

/// Log store backed by plain files in a single directory
///
/// Every operation on an active log holds that log's lock, so an append never
/// lands between the compress and truncate steps of a rotation.
pub struct FileLogStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileLogStore {
    /// Open the store, creating `root` if it does not exist
    pub async fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root, locks: Mutex::default() })
    }

    async fn lock(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    async fn compress_locked(&self, id: &str, archive_id: &str) -> Result<(), LogStoreError> {
        let source = self.active_path(id)?;
        let destination = self.archive_path(archive_id)?;

        let content = fs::read(&source).await.map_err(io_error(id))?;
        if content.is_empty() {
            return Err(LogStoreError::Empty(id.to_string()));
        }

        let encoded = tokio::task::spawn_blocking(move || gzip_base64(&content))
            .await?
            .map_err(io_error(id))?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&destination)
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => LogStoreError::ArchiveExists(archive_id.to_string()),
                _ => LogStoreError::Io { id: archive_id.to_string(), source: e },
            })?;

        let written = async {
            file.write_all(encoded.as_bytes()).await?;
            file.sync_all().await
        }
        .await;

        if let Err(source) = written {
            // A partial archive must not be mistaken for a complete one later.
            drop(file);
            let _ = fs::remove_file(&destination).await;
            return Err(LogStoreError::Io { id: archive_id.to_string(), source });
        }

        Ok(())
    }

    async fn truncate_locked(&self, id: &str) -> Result<(), LogStoreError> {
        let path = self.active_path(id)?;
        let file = OpenOptions::new().write(true).open(&path).await.map_err(io_error(id))?;
        file.set_len(0).await.map_err(io_error(id))?;
        Ok(())
    }

    fn active_path(&self, id: &str) -> Result<PathBuf, LogStoreError> {
        ensure_safe_id(id)?;
        Ok(self.root.join(format!("{id}{ACTIVE_SUFFIX}")))
    }

    fn archive_path(&self, archive_id: &str) -> Result<PathBuf, LogStoreError> {
        ensure_safe_id(archive_id)?;
        Ok(self.root.join(format!("{archive_id}{ARCHIVE_SUFFIX}")))
    }
}

fn io_error(id: &str) -> impl FnOnce(io::Error) -> LogStoreError + '_ {
    move |source| match source.kind() {
        io::ErrorKind::NotFound => LogStoreError::NotFound(id.to_string()),
        _ => LogStoreError::Io { id: id.to_string(), source },
    }
}

fn gzip_base64(content: &[u8]) -> io::Result<String> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content)?;
    Ok(STANDARD.encode(encoder.finish()?))
}

fn gunzip_base64(archive_id: &str, encoded: &str) -> Result<String, LogStoreError> {
    let corrupt = |reason: String| LogStoreError::Corrupt { id: archive_id.to_string(), reason };

    let compressed = STANDARD.decode(encoded.trim()).map_err(|e| corrupt(e.to_string()))?;
    let mut decoded = String::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_string(&mut decoded)
        .map_err(|e| corrupt(e.to_string()))?;

    Ok(decoded)
}

#[async_trait]
impl LogStorage for FileLogStore {
    async fn append(&self, id: &str, entry: &LogEntry) -> Result<(), LogStoreError> {
        let path = self.active_path(id)?;
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.lock(id).await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_error(id))?;
        file.write_all(line.as_bytes()).await.map_err(io_error(id))?;
        file.flush().await.map_err(io_error(id))?;

        Ok(())
    }

    async fn list(&self, include_archived: bool) -> Result<Vec<String>, LogStoreError> {
        let root = self.root.display().to_string();
        let mut entries = fs::read_dir(&self.root).await.map_err(io_error(&root))?;
        let mut ids = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(io_error(&root))? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };

            if let Some(id) = name.strip_suffix(ACTIVE_SUFFIX) {
                ids.push(id.to_string());
            } else if let Some(id) = name.strip_suffix(ARCHIVE_SUFFIX) {
                if include_archived {
                    ids.push(id.to_string());
                }
            }
        }

        ids.sort();
        Ok(ids)
    }

    async fn compress(&self, id: &str, archive_id: &str) -> Result<(), LogStoreError> {
        ensure_safe_id(id)?;
        let _guard = self.lock(id).await;
        self.compress_locked(id, archive_id).await
    }

    async fn decompress(&self, archive_id: &str) -> Result<String, LogStoreError> {
        let path = self.archive_path(archive_id)?;
        let encoded = fs::read_to_string(&path).await.map_err(io_error(archive_id))?;
        let archive = archive_id.to_string();

        tokio::task::spawn_blocking(move || gunzip_base64(&archive, &encoded)).await?
    }

    async fn truncate(&self, id: &str) -> Result<(), LogStoreError> {
        ensure_safe_id(id)?;
        let _guard = self.lock(id).await;
        self.truncate_locked(id).await
    }

    async fn rotate(&self, id: &str, archive_id: &str) -> Result<(), LogStoreError> {
        ensure_safe_id(id)?;
        let _guard = self.lock(id).await;
        self.compress_locked(id, archive_id).await?;
        self.truncate_locked(id).await
    }
}
