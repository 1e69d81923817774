use std::sync::Arc;

use tracing::{info, warn};

use super::types::Check;
use crate::notifications::{Notifier, NotifyError};

/// Human readable alert for a check that just changed state
pub fn format_alert(check: &Check) -> String {
    format!(
        "Alert: Your check for {} {} is currently {}",
        check.method,
        check.target(),
        check.state
    )
}

/// Sends state-change alerts to check owners, fire-and-forget
pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl AlertDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Notify the owner of `check`, which must already carry its new state.
    ///
    /// Failures are logged and returned for bookkeeping; they are never retried.
    pub async fn dispatch(&self, check: &Check) -> Result<(), NotifyError> {
        let message = format_alert(check);

        match self.notifier.send(&check.owner_id, &message).await {
            Ok(()) => {
                info!(check_id = %check.id, state = %check.state, "Owner alerted to state change");
                Ok(())
            }
            Err(e) => {
                warn!(check_id = %check.id, "Failed to alert owner: {}", e);
                Err(e)
            }
        }
    }
}
