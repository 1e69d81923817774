//! Validation of stored check records.
//!
//! Records in the `checks` collection are written by another component, so the
//! worker never trusts their shape. Every required field is checked against its
//! type and range before a [`Check`] is built; optional bookkeeping fields fall
//! back to their defaults instead of failing the record.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{Check, CheckState, HttpMethod, Protocol};

/// Bounds applied to stored check records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationLimits {
    pub id_length: usize,
    /// Exact owner id length, or `None` to accept any non-empty owner id
    pub owner_id_length: Option<usize>,
    pub min_timeout_seconds: u64,
    pub max_timeout_seconds: u64,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self { id_length: 20, owner_id_length: Some(10), min_timeout_seconds: 1, max_timeout_seconds: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("record is not an object")]
    NotAnObject,

    #[error("field '{field}' is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl ValidationError {
    fn field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField { field, reason: reason.into() }
    }
}

const KNOWN_FIELDS: [&str; 9] = [
    "id",
    "ownerId",
    "protocol",
    "url",
    "method",
    "successCodes",
    "timeoutSeconds",
    "state",
    "lastCheckedAt",
];

/// Normalize a raw stored record into a [`Check`]
pub fn validate_check(record: &Value, limits: &ValidationLimits) -> Result<Check, ValidationError> {
    let object = record.as_object().ok_or(ValidationError::NotAnObject)?;

    let id = trimmed_string(object, "id")?;
    if id.chars().count() != limits.id_length {
        return Err(ValidationError::field(
            "id",
            format!("expected {} characters, got {}", limits.id_length, id.chars().count()),
        ));
    }

    let owner_id = trimmed_string(object, "ownerId")?;
    if let Some(expected) = limits.owner_id_length {
        if owner_id.chars().count() != expected {
            return Err(ValidationError::field(
                "ownerId",
                format!("expected {expected} characters"),
            ));
        }
    }

    let protocol = match trimmed_string(object, "protocol")?.as_str() {
        "http" => Protocol::Http,
        "https" => Protocol::Https,
        other => return Err(ValidationError::field("protocol", format!("unsupported '{other}'"))),
    };

    let url = trimmed_string(object, "url")?;

    let method = match trimmed_string(object, "method")?.as_str() {
        "get" => HttpMethod::Get,
        "post" => HttpMethod::Post,
        "put" => HttpMethod::Put,
        "delete" => HttpMethod::Delete,
        other => return Err(ValidationError::field("method", format!("unsupported '{other}'"))),
    };

    let success_codes = validate_success_codes(object.get("successCodes"))?;
    let timeout_seconds = validate_timeout(object.get("timeoutSeconds"), limits)?;

    let state = match object.get("state").and_then(Value::as_str).map(str::trim) {
        Some("up") => CheckState::Up,
        _ => CheckState::Down,
    };

    let last_checked_at = object
        .get("lastCheckedAt")
        .and_then(whole_number)
        .filter(|millis| *millis > 0)
        .and_then(DateTime::<Utc>::from_timestamp_millis);

    let extra = object
        .iter()
        .filter(|(key, _)| !KNOWN_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(Check {
        id,
        owner_id,
        protocol,
        url,
        method,
        success_codes,
        timeout_seconds,
        state,
        last_checked_at,
        extra,
    })
}

fn trimmed_string(object: &Map<String, Value>, field: &'static str) -> Result<String, ValidationError> {
    let value = object
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ValidationError::field(field, "missing or not a string"))?
        .trim();

    if value.is_empty() {
        return Err(ValidationError::field(field, "empty"));
    }

    Ok(value.to_string())
}

fn validate_success_codes(value: Option<&Value>) -> Result<BTreeSet<u16>, ValidationError> {
    let codes = value
        .and_then(Value::as_array)
        .ok_or_else(|| ValidationError::field("successCodes", "missing or not an array"))?;

    if codes.is_empty() {
        return Err(ValidationError::field("successCodes", "empty"));
    }

    codes
        .iter()
        .map(|code| {
            code.as_u64()
                .filter(|code| (100..=599).contains(code))
                .map(|code| code as u16)
                .ok_or_else(|| ValidationError::field("successCodes", format!("{code} is not an HTTP status")))
        })
        .collect()
}

/// Integer JSON numbers, plus floats without a fractional part (`3.0`)
fn whole_number(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|n| n.fract() == 0.0 && *n >= i64::MIN as f64 && *n < i64::MAX as f64)
            .map(|n| n as i64)
    })
}

fn validate_timeout(value: Option<&Value>, limits: &ValidationLimits) -> Result<u64, ValidationError> {
    let timeout = value
        .and_then(whole_number)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| ValidationError::field("timeoutSeconds", "missing or not a whole number"))?;

    if timeout < limits.min_timeout_seconds || timeout > limits.max_timeout_seconds {
        return Err(ValidationError::field(
            "timeoutSeconds",
            format!(
                "{timeout} outside [{}, {}]",
                limits.min_timeout_seconds, limits.max_timeout_seconds
            ),
        ));
    }

    Ok(timeout)
}
