use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::checker::Checker;
use super::types::{Check, Outcome};

/// Monitoring executor - runs one check through its checker
pub struct MonitoringExecutor {
    checker: Arc<dyn Checker>,
}

impl MonitoringExecutor {
    pub fn new(checker: Arc<dyn Checker>) -> Self {
        Self { checker }
    }

    /// Execute a check, always yielding exactly one outcome
    pub async fn execute_check(&self, check: &Check) -> Outcome {
        let start = Instant::now();
        let outcome = self.checker.check(check).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match (outcome.response_code(), outcome.error()) {
            (Some(code), _) => {
                debug!(check_id = %check.id, code, elapsed_ms, "{} {}", check.method, check.target())
            }
            (None, Some(error)) => debug!(
                check_id = %check.id,
                elapsed_ms,
                "{} {} failed: {}",
                check.method,
                check.target(),
                error.message
            ),
            (None, None) => {}
        }

        outcome
    }
}
