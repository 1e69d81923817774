//! Turns an outcome into a state change, a log entry and possibly an alert.

use std::sync::Arc;

use tracing::{debug, warn};

use super::alert::AlertDispatcher;
use super::types::{Check, CheckState, LogEntry, Outcome};
use crate::clock::Clock;
use crate::logs::LogStorage;
use crate::store::{CHECKS, ObjectStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub new_state: CheckState,
    pub alert_warranted: bool,
}

/// Classify an outcome against a check.
///
/// A check is up only when a response arrived with one of its success codes.
/// An alert is warranted on a state change, but never on the first evaluation
/// since there is no previous state to compare against.
pub fn evaluate(check: &Check, outcome: &Outcome) -> Evaluation {
    let new_state = match (outcome.error(), outcome.response_code()) {
        (None, Some(code)) if check.success_codes.contains(&code) => CheckState::Up,
        _ => CheckState::Down,
    };

    Evaluation {
        new_state,
        alert_warranted: check.last_checked_at.is_some() && check.state != new_state,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertStatus {
    NotWarranted,
    Sent,
    Failed,
    /// Warranted, but the new state could not be stored; the transition is
    /// recomputed next cycle
    Suppressed,
}

/// What happened while processing one outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessReport {
    pub evaluation: Evaluation,
    pub persisted: bool,
    pub logged: bool,
    pub alert: AlertStatus,
}

pub struct OutcomeProcessor {
    store: Arc<dyn ObjectStore>,
    logs: Arc<dyn LogStorage>,
    alerts: AlertDispatcher,
    clock: Arc<dyn Clock>,
}

impl OutcomeProcessor {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        logs: Arc<dyn LogStorage>,
        alerts: AlertDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, logs, alerts, clock }
    }

    pub async fn process(&self, check: Check, outcome: Outcome) -> ProcessReport {
        let evaluation = evaluate(&check, &outcome);
        let now = self.clock.now();

        let mut updated = check.clone();
        updated.state = evaluation.new_state;
        updated.last_checked_at = Some(now);

        let persisted = match serde_json::to_value(&updated) {
            Ok(record) => match self.store.update(CHECKS, &updated.id, &record).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(check_id = %updated.id, "Failed to save check state: {}", e);
                    false
                }
            },
            Err(e) => {
                warn!(check_id = %updated.id, "Failed to encode check: {}", e);
                false
            }
        };

        let entry = LogEntry {
            state: evaluation.new_state,
            check,
            outcome,
            alert: evaluation.alert_warranted,
            time: now,
        };
        let logged = match self.logs.append(&updated.id, &entry).await {
            Ok(()) => true,
            Err(e) => {
                warn!(check_id = %updated.id, "Failed to log evaluation: {}", e);
                false
            }
        };

        let alert = match (evaluation.alert_warranted, persisted) {
            (false, _) => {
                debug!(check_id = %updated.id, "Check state unchanged, no alert needed");
                AlertStatus::NotWarranted
            }
            (true, false) => AlertStatus::Suppressed,
            (true, true) => match self.alerts.dispatch(&updated).await {
                Ok(()) => AlertStatus::Sent,
                Err(_) => AlertStatus::Failed,
            },
        };

        ProcessReport { evaluation, persisted, logged, alert }
    }
}
