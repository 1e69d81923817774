use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::{Method, redirect};
use tokio::sync::oneshot;
use tracing::debug;
use url::Url;

use super::types::{Check, HttpMethod, Outcome};

/// Executes a single check and reports exactly one outcome
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, check: &Check) -> Outcome;
}

/// Settles an [`Outcome`] exactly once.
///
/// The response, transport error and timeout paths all race to resolve the
/// same slot; only the first call to [`OutcomeSlot::resolve`] is delivered.
pub struct OutcomeSlot {
    sender: Mutex<Option<oneshot::Sender<Outcome>>>,
}

impl OutcomeSlot {
    pub fn new() -> (Arc<Self>, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        (Arc::new(Self { sender: Mutex::new(Some(tx)) }), rx)
    }

    /// Returns `true` if this call settled the slot
    pub fn resolve(&self, outcome: Outcome) -> bool {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
        match sender {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

/// HTTP/HTTPS checker
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new() -> reqwest::Result<Self> {
        // Redirect statuses are reported as-is and matched against success codes.
        let client = reqwest::Client::builder().redirect(redirect::Policy::none()).build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, check: &Check) -> Outcome {
        let target = match Url::parse(&check.target()) {
            Ok(url) if url.host_str().is_some() => url,
            Ok(_) => return Outcome::transport(format!("target {} has no host", check.target())),
            Err(e) => return Outcome::transport(format!("invalid target {}: {e}", check.target())),
        };

        let timeout = check.timeout();
        let (slot, settled) = OutcomeSlot::new();

        let request = self.client.request(check.method.into(), target).timeout(timeout).send();
        let request_slot = Arc::clone(&slot);
        let request_task = tokio::spawn(async move {
            let outcome = match request.await {
                Ok(response) => Outcome::response(response.status().as_u16()),
                Err(e) if e.is_timeout() => Outcome::timeout(timeout),
                Err(e) => Outcome::transport(e.to_string()),
            };
            request_slot.resolve(outcome);
        });

        let timer_slot = Arc::clone(&slot);
        let timer_task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if timer_slot.resolve(Outcome::timeout(timeout)) {
                debug!("Check timed out after {}ms", timeout.as_millis());
            }
        });

        let outcome = settled
            .await
            .unwrap_or_else(|_| Outcome::transport("check ended without an outcome"));

        // Whichever source lost the race has nothing left to report.
        request_task.abort();
        timer_task.abort();

        outcome
    }
}
