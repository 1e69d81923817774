//! Delivery of alert messages to check owners.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

pub mod twilio;

pub use twilio::{TwilioConfig, TwilioNotifier};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Provider rejected the message with status {0}")]
    Rejected(u16),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// A provider that can deliver a text message to a recipient
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError>;
}

/// Writes alerts to the service log instead of delivering them
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        if message.trim().is_empty() {
            return Err(NotifyError::InvalidMessage("empty message".to_string()));
        }
        info!(recipient, "{}", message);
        Ok(())
    }
}
