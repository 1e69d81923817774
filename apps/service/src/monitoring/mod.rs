pub mod alert;
pub mod checker;
/// Monitoring engine module - evaluates stored checks
///
/// This module is responsible for:
/// - Validating stored check records
/// - Executing HTTP/HTTPS checks with a hard timeout
/// - Turning outcomes into state changes, log entries and alerts
/// - Scheduling the check and log rotation cycles
pub mod executor;
pub mod processor;
pub mod scheduler;
pub mod types;
pub mod validation;

pub use executor::MonitoringExecutor;
pub use processor::{OutcomeProcessor, ProcessReport};
pub use scheduler::MonitoringScheduler;
pub use types::{Check, CheckState, LogEntry, Outcome};
