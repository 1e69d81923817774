use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Up/down state of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Up,
    #[default]
    Down,
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckState::Up => write!(f, "up"),
            CheckState::Down => write!(f, "down"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Https => write!(f, "https"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_upper(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_upper())
    }
}

/// A validated monitoring definition as stored in the `checks` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    pub id: String,

    /// Account that receives alerts for this check
    pub owner_id: String,

    pub protocol: Protocol,

    /// Host and path, without the scheme
    pub url: String,

    pub method: HttpMethod,

    pub success_codes: BTreeSet<u16>,

    pub timeout_seconds: u64,

    #[serde(default)]
    pub state: CheckState,

    /// Absent until the first evaluation
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_checked_at: Option<DateTime<Utc>>,

    /// Fields owned by other writers of the record, kept as-is on update
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Check {
    /// `<protocol>://<url>`
    pub fn target(&self) -> String {
        format!("{}://{}", self.protocol, self.url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_seconds * 1000)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Transport,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeError {
    pub kind: FailureKind,
    pub message: String,
}

/// Result of one check execution: an error descriptor or a response code, never both
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    error: Option<OutcomeError>,
    response_code: Option<u16>,
}

impl Outcome {
    pub fn response(code: u16) -> Self {
        Self { error: None, response_code: Some(code) }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            error: Some(OutcomeError { kind: FailureKind::Transport, message: message.into() }),
            response_code: None,
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self {
            error: Some(OutcomeError {
                kind: FailureKind::Timeout,
                message: format!("no response within {}ms", after.as_millis()),
            }),
            response_code: None,
        }
    }

    pub fn error(&self) -> Option<&OutcomeError> {
        self.error.as_ref()
    }

    pub fn response_code(&self) -> Option<u16> {
        self.response_code
    }

    pub fn is_timeout(&self) -> bool {
        matches!(&self.error, Some(e) if e.kind == FailureKind::Timeout)
    }
}

/// One line of a per-check log file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// State computed by this evaluation
    pub state: CheckState,

    /// The check as it was before this evaluation
    pub check: Check,

    pub outcome: Outcome,

    /// Whether this evaluation warranted an alert
    pub alert: bool,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
}
