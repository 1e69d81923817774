use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::info;

use crate::config::Schedule;
use crate::orchestrator::Orchestrator;

/// Background loops started by [`MonitoringScheduler::start`]
pub struct SchedulerHandles {
    pub checks: JoinHandle<()>,
    pub rotation: JoinHandle<()>,
}

/// Monitoring scheduler - drives the check and rotation cycles
pub struct MonitoringScheduler {
    worker: Arc<Orchestrator>,
}

impl MonitoringScheduler {
    pub fn new(worker: Arc<Orchestrator>) -> Self {
        Self { worker }
    }

    /// Start both cycles. Each runs once immediately, then on its interval.
    pub fn start(&self, schedule: &Schedule) -> SchedulerHandles {
        info!(
            "Scheduling check cycle every {}s and log rotation every {}s",
            schedule.check_interval_seconds, schedule.rotation_interval_seconds
        );

        SchedulerHandles {
            checks: self.start_check_cycle(schedule.check_interval()),
            rotation: Arc::clone(self.worker.rotator()).start_periodic_rotation(schedule.rotation_interval()),
        }
    }

    /// Each tick spawns its own cycle, so a slow cycle never delays the next one
    fn start_check_cycle(&self, every: Duration) -> JoinHandle<()> {
        let worker = Arc::clone(&self.worker);

        tokio::spawn(async move {
            let mut timer = interval(every);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                timer.tick().await;

                let worker = Arc::clone(&worker);
                tokio::spawn(async move {
                    worker.run_check_cycle().await;
                });
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::monitoring::checker::Checker;
    use crate::monitoring::checker::tests::sample_check;
    use crate::monitoring::processor::tests::{RecordingLogs, RecordingNotifier};
    use crate::monitoring::types::{Check, Outcome};
    use crate::monitoring::validation::ValidationLimits;
    use crate::orchestrator::Collaborators;
    use crate::store::{CHECKS, MemoryStore, ObjectStore};
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Checker that counts calls and takes `delay` to answer
    struct CountingChecker {
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl Checker for CountingChecker {
        async fn check(&self, _check: &Check) -> Outcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Outcome::response(200)
        }
    }

    async fn worker(delay: Duration) -> (Arc<Orchestrator>, Arc<CountingChecker>) {
        let store = Arc::new(MemoryStore::new());
        let check = sample_check("example.com/".to_string());
        store.create(CHECKS, &check.id, &serde_json::to_value(&check).unwrap()).await.unwrap();

        let checker = Arc::new(CountingChecker { calls: AtomicUsize::new(0), delay });
        let collaborators = Collaborators {
            store,
            checker: checker.clone(),
            logs: Arc::new(RecordingLogs::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            clock: Arc::new(ManualClock::new(DateTime::<Utc>::UNIX_EPOCH)),
        };
        (Arc::new(Orchestrator::new(collaborators, ValidationLimits::default())), checker)
    }

    fn schedule() -> Schedule {
        Schedule { check_interval_seconds: 60, rotation_interval_seconds: 24 * 3600 }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_cycle_runs_immediately_then_on_interval() {
        let (worker, checker) = worker(Duration::ZERO).await;
        let handles = MonitoringScheduler::new(worker).start(&schedule());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(checker.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(checker.calls.load(Ordering::SeqCst), 2);

        handles.checks.abort();
        handles.rotation.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_still_in_flight_is_skipped() {
        // Each check takes longer than the interval between cycles.
        let (worker, checker) = worker(Duration::from_secs(90)).await;
        let handles = MonitoringScheduler::new(worker).start(&schedule());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(checker.calls.load(Ordering::SeqCst), 1, "second tick must skip the busy check");

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(checker.calls.load(Ordering::SeqCst), 2, "check is picked up again once idle");

        handles.checks.abort();
        handles.rotation.abort();
    }
}
