//! Compression and truncation of active logs.
//!
//! Rotation archives each non-empty active log and truncates it afterwards.
//! A log is only truncated once its archive has been written successfully.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{LogStorage, LogStoreError, archive_id};
use crate::clock::Clock;

/// Tally of one rotation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationReport {
    pub rotated: usize,
    /// Logs with nothing to archive
    pub skipped: usize,
    /// Logs left untouched because compression or truncation failed
    pub failed: usize,
}

/// Rotates every active log in a [`LogStorage`]
pub struct LogRotator {
    logs: Arc<dyn LogStorage>,
    clock: Arc<dyn Clock>,
    sequence: AtomicU64,
}

impl LogRotator {
    pub fn new(logs: Arc<dyn LogStorage>, clock: Arc<dyn Clock>) -> Self {
        Self { logs, clock, sequence: AtomicU64::new(0) }
    }

    fn next_archive_id(&self, id: &str) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        archive_id(id, self.clock.now(), sequence)
    }

    /// Compress then truncate one active log, returning the archive id
    pub async fn rotate(&self, id: &str) -> Result<String, LogStoreError> {
        let archive = self.next_archive_id(id);
        self.logs.rotate(id, &archive).await?;
        Ok(archive)
    }

    /// Rotate every active log
    pub async fn rotate_all(&self) -> Result<RotationReport, LogStoreError> {
        let ids = self.logs.list(false).await?;
        let mut report = RotationReport::default();

        if ids.is_empty() {
            debug!("No logs to rotate");
            return Ok(report);
        }

        for id in ids {
            match self.rotate(&id).await {
                Ok(archive) => {
                    debug!(log_id = %id, archive = %archive, "Rotated log");
                    report.rotated += 1;
                }
                Err(LogStoreError::Empty(_)) => report.skipped += 1,
                Err(e) => {
                    warn!(log_id = %id, "Failed to rotate log: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Log rotation completed: {} rotated, {} empty, {} failed",
            report.rotated, report.skipped, report.failed
        );

        Ok(report)
    }

    /// Start the background rotation loop; the first pass runs immediately
    pub fn start_periodic_rotation(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                if let Err(e) = self.rotate_all().await {
                    warn!("Periodic log rotation failed: {}", e);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::logs::FileLogStore;
    use crate::monitoring::types::LogEntry;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000).unwrap()))
    }

    /// Storage whose compression always fails, recording every call
    #[derive(Default)]
    struct FailingCompression {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LogStorage for FailingCompression {
        async fn append(&self, _: &str, _: &LogEntry) -> Result<(), LogStoreError> {
            Ok(())
        }

        async fn list(&self, _: bool) -> Result<Vec<String>, LogStoreError> {
            Ok(vec!["one".to_string(), "two".to_string()])
        }

        async fn compress(&self, id: &str, _: &str) -> Result<(), LogStoreError> {
            self.calls.lock().unwrap().push(format!("compress:{id}"));
            Err(LogStoreError::Io {
                id: id.to_string(),
                source: std::io::Error::other("disk full"),
            })
        }

        async fn decompress(&self, archive_id: &str) -> Result<String, LogStoreError> {
            Err(LogStoreError::NotFound(archive_id.to_string()))
        }

        async fn truncate(&self, id: &str) -> Result<(), LogStoreError> {
            self.calls.lock().unwrap().push(format!("truncate:{id}"));
            Ok(())
        }
    }

    /// Storage whose first listing takes longer than the rotation interval
    #[derive(Default)]
    struct SlowFirstListing {
        listings: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl LogStorage for SlowFirstListing {
        async fn append(&self, _: &str, _: &LogEntry) -> Result<(), LogStoreError> {
            Ok(())
        }

        async fn list(&self, _: bool) -> Result<Vec<String>, LogStoreError> {
            if self.listings.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_secs(25)).await;
            }
            Ok(Vec::new())
        }

        async fn compress(&self, id: &str, _: &str) -> Result<(), LogStoreError> {
            Err(LogStoreError::NotFound(id.to_string()))
        }

        async fn decompress(&self, archive_id: &str) -> Result<String, LogStoreError> {
            Err(LogStoreError::NotFound(archive_id.to_string()))
        }

        async fn truncate(&self, id: &str) -> Result<(), LogStoreError> {
            Err(LogStoreError::NotFound(id.to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_rotation_delays_later_passes_instead_of_bursting() {
        let storage = Arc::new(SlowFirstListing::default());
        let rotator = Arc::new(LogRotator::new(storage.clone(), clock()));

        let handle = rotator.start_periodic_rotation(Duration::from_secs(10));

        // Passes start at 0s, 25s (late tick) and 35s; missed ticks are not replayed.
        tokio::time::sleep(Duration::from_secs(39)).await;
        assert_eq!(storage.listings.load(Ordering::SeqCst), 3);

        handle.abort();
    }

    #[tokio::test]
    async fn test_failed_compression_never_truncates() {
        let storage = Arc::new(FailingCompression::default());
        let rotator = LogRotator::new(storage.clone(), clock());

        let report = rotator.rotate_all().await.unwrap();

        assert_eq!(report, RotationReport { rotated: 0, skipped: 0, failed: 2 });
        let calls = storage.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["compress:one", "compress:two"]);
    }

    #[tokio::test]
    async fn test_rotation_archives_then_truncates() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FileLogStore::open(dir.path()).await.unwrap());
        tokio::fs::write(dir.path().join("busy.log"), "line 1\nline 2\n").await.unwrap();
        tokio::fs::write(dir.path().join("idle.log"), "").await.unwrap();

        let rotator = LogRotator::new(store.clone(), clock());
        let report = rotator.rotate_all().await.unwrap();

        assert_eq!(report, RotationReport { rotated: 1, skipped: 1, failed: 0 });
        let busy = tokio::fs::metadata(dir.path().join("busy.log")).await.unwrap();
        assert_eq!(busy.len(), 0);

        let archives: Vec<String> = store
            .list(true)
            .await
            .unwrap()
            .into_iter()
            .filter(|id| id.starts_with("busy-"))
            .collect();
        assert_eq!(archives, vec!["busy-1700000000000-0".to_string()]);
        assert_eq!(store.decompress(&archives[0]).await.unwrap(), "line 1\nline 2\n");
    }

    #[tokio::test]
    async fn test_repeated_rotation_in_same_millisecond_gets_fresh_archive() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FileLogStore::open(dir.path()).await.unwrap());
        let rotator = LogRotator::new(store.clone(), clock());

        tokio::fs::write(dir.path().join("busy.log"), "first\n").await.unwrap();
        let first = rotator.rotate("busy").await.unwrap();
        tokio::fs::write(dir.path().join("busy.log"), "second\n").await.unwrap();
        let second = rotator.rotate("busy").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(store.decompress(&first).await.unwrap(), "first\n");
        assert_eq!(store.decompress(&second).await.unwrap(), "second\n");
    }
}
