/// Orchestrator module - coordinates all components
///
/// The orchestrator is the worker service that:
/// - Owns the injected collaborators (store, checker, logs, notifier, clock)
/// - Runs every stored check through validate -> execute -> process
/// - Fans each cycle out across checks and tallies the results
/// - Hands the rotator to the scheduler for the log rotation cycle


use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, NotificationProvider};
use crate::logs::{FileLogStore, LogRotator, LogStorage, LogStoreError, RotationReport};
use crate::monitoring::alert::AlertDispatcher;
use crate::monitoring::checker::{Checker, HttpChecker};
use crate::monitoring::processor::AlertStatus;
use crate::monitoring::validation::{ValidationLimits, validate_check};
use crate::monitoring::{MonitoringExecutor, MonitoringScheduler, OutcomeProcessor, ProcessReport};
use crate::notifications::{LogNotifier, Notifier, TwilioNotifier};
use crate::store::{CHECKS, FsObjectStore, ObjectStore};

/// External services the worker talks to
pub struct Collaborators {
    pub store: Arc<dyn ObjectStore>,
    pub checker: Arc<dyn Checker>,
    pub logs: Arc<dyn LogStorage>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

/// How a single check id fared in a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// The previous pipeline for this id has not finished yet
    InFlight,
    Unreadable,
    Invalid,
    Evaluated(ProcessReport),
}

/// Tally of one check cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub listed: usize,
    pub evaluated: usize,
    pub in_flight: usize,
    pub unreadable: usize,
    pub invalid: usize,
    pub alerts_sent: usize,
    pub alerts_failed: usize,
    /// Pipelines that panicked
    pub aborted: usize,
}

impl CycleReport {
    fn record(&mut self, status: CheckStatus) {
        match status {
            CheckStatus::InFlight => self.in_flight += 1,
            CheckStatus::Unreadable => self.unreadable += 1,
            CheckStatus::Invalid => self.invalid += 1,
            CheckStatus::Evaluated(report) => {
                self.evaluated += 1;
                match report.alert {
                    AlertStatus::Sent => self.alerts_sent += 1,
                    AlertStatus::Failed => self.alerts_failed += 1,
                    AlertStatus::NotWarranted | AlertStatus::Suppressed => {}
                }
            }
        }
    }
}

/// Ids whose pipeline is currently running
#[derive(Default)]
struct InFlight {
    ids: Mutex<HashSet<String>>,
}

impl InFlight {
    fn claim(self: &Arc<Self>, id: &str) -> Option<InFlightGuard> {
        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        ids.insert(id.to_string())
            .then(|| InFlightGuard { registry: Arc::clone(self), id: id.to_string() })
    }
}

/// Releases its id when the pipeline ends, however it ends
struct InFlightGuard {
    registry: Arc<InFlight>,
    id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.ids.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.id);
    }
}

/// Main orchestrator for the checkup worker
pub struct Orchestrator {
    store: Arc<dyn ObjectStore>,
    limits: ValidationLimits,
    executor: MonitoringExecutor,
    processor: OutcomeProcessor,
    rotator: Arc<LogRotator>,
    in_flight: Arc<InFlight>,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators, limits: ValidationLimits) -> Self {
        let Collaborators { store, checker, logs, notifier, clock } = collaborators;

        Self {
            executor: MonitoringExecutor::new(checker),
            processor: OutcomeProcessor::new(
                Arc::clone(&store),
                Arc::clone(&logs),
                AlertDispatcher::new(notifier),
                Arc::clone(&clock),
            ),
            rotator: Arc::new(LogRotator::new(logs, clock)),
            in_flight: Arc::default(),
            store,
            limits,
        }
    }

    /// Build the production collaborators described by `config`
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(FsObjectStore::new(&config.storage.data_dir));
        let logs = Arc::new(FileLogStore::open(&config.storage.logs_dir).await.with_context(|| {
            format!("Failed to open log directory {}", config.storage.logs_dir.display())
        })?);
        let checker = Arc::new(HttpChecker::new().context("Failed to build HTTP client")?);

        let notifier: Arc<dyn Notifier> = match config.notifications.provider {
            NotificationProvider::Log => Arc::new(LogNotifier),
            NotificationProvider::Twilio => {
                Arc::new(TwilioNotifier::new(config.notifications.twilio.clone()))
            }
        };
        info!("Alerts go through the {} provider", config.notifications.provider);

        let collaborators =
            Collaborators { store, checker, logs, notifier, clock: Arc::new(SystemClock) };
        Ok(Self::new(collaborators, ValidationLimits::from(&config.checks)))
    }

    /// Create the orchestrator and run both cycles until Ctrl-C
    pub async fn start(config: Config) -> Result<()> {
        info!("Starting checkup worker...");
        let orchestrator = Arc::new(Self::from_config(&config).await?);

        let handles = MonitoringScheduler::new(orchestrator).start(&config.schedule);

        tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
        info!("Shutdown signal received, stopping worker");

        handles.checks.abort();
        handles.rotation.abort();
        Ok(())
    }

    pub fn rotator(&self) -> &Arc<LogRotator> {
        &self.rotator
    }

    /// Run one check id through the whole pipeline
    pub async fn process_check(&self, id: &str) -> CheckStatus {
        let Some(_guard) = self.in_flight.claim(id) else {
            debug!(check_id = %id, "Previous run still in flight, skipping");
            return CheckStatus::InFlight;
        };

        let record = match self.store.read(CHECKS, id).await {
            Ok(record) => record,
            Err(e) => {
                warn!(check_id = %id, "Failed to read check: {}", e);
                return CheckStatus::Unreadable;
            }
        };

        let check = match validate_check(&record, &self.limits) {
            Ok(check) => check,
            Err(e) => {
                warn!(check_id = %id, "Skipping malformed check: {}", e);
                return CheckStatus::Invalid;
            }
        };

        if check.id != id {
            warn!(check_id = %id, "Skipping check stored under a different id ({})", check.id);
            return CheckStatus::Invalid;
        }

        let outcome = self.executor.execute_check(&check).await;
        CheckStatus::Evaluated(self.processor.process(check, outcome).await)
    }

    /// Evaluate every stored check concurrently
    pub async fn run_check_cycle(self: &Arc<Self>) -> CycleReport {
        let ids = match self.store.list(CHECKS).await {
            Ok(ids) => ids,
            Err(e) => {
                error!("Failed to list checks: {}", e);
                return CycleReport::default();
            }
        };

        let mut report = CycleReport { listed: ids.len(), ..CycleReport::default() };
        let mut pipelines = JoinSet::new();

        for id in ids {
            let worker = Arc::clone(self);
            pipelines.spawn(async move { worker.process_check(&id).await });
        }

        while let Some(joined) = pipelines.join_next().await {
            match joined {
                Ok(status) => report.record(status),
                Err(e) => {
                    warn!("Check pipeline aborted: {}", e);
                    report.aborted += 1;
                }
            }
        }

        info!(
            "Check cycle completed: {} listed, {} evaluated, {} in flight, {} invalid, {} unreadable, {} alerts sent",
            report.listed,
            report.evaluated,
            report.in_flight,
            report.invalid,
            report.unreadable,
            report.alerts_sent
        );

        report
    }

    /// Rotate every active log once
    pub async fn run_rotation_cycle(&self) -> Result<RotationReport, LogStoreError> {
        self.rotator.rotate_all().await
    }
}
