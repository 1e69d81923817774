use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{Notifier, NotifyError};

const MAX_MESSAGE_CHARS: usize = 1600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_phone: String,
    /// Prepended to the owner id to form the destination number
    pub country_prefix: String,
    /// Expected owner id length, `0` to skip the check
    pub recipient_length: usize,
    pub api_base: String,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            from_phone: String::new(),
            country_prefix: "+1".to_string(),
            recipient_length: 10,
            api_base: "https://api.twilio.com".to_string(),
        }
    }
}

/// Sends alerts as SMS through the Twilio messages API
pub struct TwilioNotifier {
    client: Client,
    config: TwilioConfig,
}

impl TwilioNotifier {
    pub fn new(config: TwilioConfig) -> Self {
        Self { client: Client::new(), config }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

#[async_trait]
impl Notifier for TwilioNotifier {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        let recipient = recipient.trim();
        if recipient.is_empty()
            || (self.config.recipient_length > 0
                && recipient.chars().count() != self.config.recipient_length)
        {
            return Err(NotifyError::InvalidRecipient(recipient.to_string()));
        }

        let message = message.trim();
        let length = message.chars().count();
        if length == 0 || length > MAX_MESSAGE_CHARS {
            return Err(NotifyError::InvalidMessage(format!(
                "length {length} outside 1..={MAX_MESSAGE_CHARS}"
            )));
        }

        let to = format!("{}{}", self.config.country_prefix, recipient);
        let form = [("From", self.config.from_phone.as_str()), ("To", to.as_str()), ("Body", message)];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            status => Err(NotifyError::Rejected(status.as_u16())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Fake messages endpoint that records request heads and answers with `status`
    async fn fake_api(status: &'static str) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let _ = tx.send(String::from_utf8_lossy(&buf[..n]).to_string());
                let response =
                    format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        (format!("http://{addr}"), rx)
    }

    fn config(api_base: String) -> TwilioConfig {
        TwilioConfig {
            account_sid: "AC123".to_string(),
            auth_token: "secret".to_string(),
            from_phone: "+15550000000".to_string(),
            api_base,
            ..TwilioConfig::default()
        }
    }

    #[tokio::test]
    async fn test_created_is_success() {
        let (base, mut requests) = fake_api("201 Created").await;
        let notifier = TwilioNotifier::new(config(base));

        notifier.send("5550001234", "Alert: check is down").await.unwrap();

        let head = requests.recv().await.unwrap();
        assert!(head.starts_with("POST /2010-04-01/Accounts/AC123/Messages.json"));
        assert!(head.to_ascii_lowercase().contains("authorization: basic"));
    }

    #[tokio::test]
    async fn test_other_status_is_rejected() {
        let (base, _requests) = fake_api("400 Bad Request").await;
        let notifier = TwilioNotifier::new(config(base));

        let err = notifier.send("5550001234", "Alert").await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected(400)));
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_network() {
        let notifier = TwilioNotifier::new(config("http://127.0.0.1:9".to_string()));

        assert!(matches!(
            notifier.send("123", "Alert").await,
            Err(NotifyError::InvalidRecipient(_))
        ));
        assert!(matches!(
            notifier.send("5550001234", "   ").await,
            Err(NotifyError::InvalidMessage(_))
        ));
        let long = "x".repeat(MAX_MESSAGE_CHARS + 1);
        assert!(matches!(
            notifier.send("5550001234", &long).await,
            Err(NotifyError::InvalidMessage(_))
        ));
    }
}
