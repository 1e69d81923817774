//! End to end: file-backed store and logs, real HTTP checks against a local stub.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use checkup::clock::SystemClock;
use checkup::logs::{FileLogStore, LogStorage};
use checkup::monitoring::LogEntry;
use checkup::monitoring::checker::HttpChecker;
use checkup::monitoring::validation::ValidationLimits;
use checkup::notifications::{Notifier, NotifyError};
use checkup::orchestrator::{Collaborators, Orchestrator};
use checkup::store::{CHECKS, FsObjectStore, ObjectStore};
use serde_json::json;
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const CHECK_ID: &str = "abcdefghij0123456789";

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Notifier for Outbox {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((recipient.to_string(), message.to_string()));
        Ok(())
    }
}

/// HTTP stub that answers every request with the current status code
async fn status_server(status: Arc<AtomicU16>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let code = status.load(Ordering::SeqCst);
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response =
                    format!("HTTP/1.1 {code} Stub\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });
    addr.to_string()
}

#[tokio::test]
async fn test_down_transition_is_stored_logged_alerted_and_rotated() {
    let data = tempdir().unwrap();
    let log_dir = tempdir().unwrap();
    let status = Arc::new(AtomicU16::new(200));
    let host = status_server(status.clone()).await;

    let store = Arc::new(FsObjectStore::new(data.path()));
    store
        .create(
            CHECKS,
            CHECK_ID,
            &json!({
                "id": CHECK_ID,
                "ownerId": "5550001234",
                "protocol": "http",
                "url": format!("{host}/health"),
                "method": "get",
                "successCodes": [200],
                "timeoutSeconds": 2,
                "label": "homepage",
            }),
        )
        .await
        .unwrap();

    let logs = Arc::new(FileLogStore::open(log_dir.path()).await.unwrap());
    let outbox = Arc::new(Outbox::default());
    let worker = Arc::new(Orchestrator::new(
        Collaborators {
            store: store.clone(),
            checker: Arc::new(HttpChecker::new().unwrap()),
            logs: logs.clone(),
            notifier: outbox.clone(),
            clock: Arc::new(SystemClock),
        },
        ValidationLimits::default(),
    ));

    let baseline = worker.run_check_cycle().await;
    assert_eq!((baseline.evaluated, baseline.alerts_sent), (1, 0));

    status.store(503, Ordering::SeqCst);
    let outage = worker.run_check_cycle().await;
    assert_eq!((outage.evaluated, outage.alerts_sent), (1, 1));

    let stored = store.read(CHECKS, CHECK_ID).await.unwrap();
    assert_eq!(stored["state"], "down");
    assert_eq!(stored["label"], "homepage", "unknown fields survive the update");
    assert!(stored["lastCheckedAt"].as_i64().unwrap() > 0);

    let sent = outbox.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "5550001234");
    assert_eq!(sent[0].1, format!("Alert: Your check for GET http://{host}/health is currently down"));

    let rotation = worker.run_rotation_cycle().await.unwrap();
    assert_eq!(rotation.rotated, 1);

    let archives: Vec<String> = logs
        .list(true)
        .await
        .unwrap()
        .into_iter()
        .filter(|id| id != CHECK_ID)
        .collect();
    assert_eq!(archives.len(), 1);

    let archived = logs.decompress(&archives[0]).await.unwrap();
    let entries: Vec<LogEntry> =
        archived.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert_eq!(entries.len(), 2);
    assert!(!entries[0].alert);
    assert!(entries[1].alert);
    assert_eq!(entries[1].outcome.response_code(), Some(503));

    let active = tokio::fs::metadata(log_dir.path().join(format!("{CHECK_ID}.log"))).await.unwrap();
    assert_eq!(active.len(), 0, "active log is truncated after archiving");
}
