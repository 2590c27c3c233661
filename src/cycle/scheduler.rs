//! Interval timer that spawns a cycle on every tick.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{CycleOrchestrator, CycleOutcome};

/// Fires one cycle immediately and then one per `interval`.
///
/// Cycles run on their own tasks, so a tick that lands during a slow cycle
/// still reaches the orchestrator and is recorded as skipped.
pub struct Scheduler {
    orchestrator: Arc<CycleOrchestrator>,
    interval: Duration,
    grace: Duration,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<CycleOrchestrator>, interval: Duration, grace: Duration) -> Self {
        Self {
            orchestrator,
            interval,
            grace,
        }
    }

    /// Uses the interval and shutdown grace from the orchestrator's config.
    pub fn from_config(orchestrator: Arc<CycleOrchestrator>) -> Self {
        let interval = orchestrator.config().interval;
        let grace = orchestrator.config().shutdown_grace;
        Self::new(orchestrator, interval, grace)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs until `shutdown` is cancelled, then waits up to the grace period
    /// for in-flight cycles. Returns how many cycles were abandoned.
    pub async fn run(&self, shutdown: CancellationToken) -> usize {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_secs = self.interval.as_secs(),
            "Scheduler started"
        );

        let mut in_flight: Vec<JoinHandle<CycleOutcome>> = Vec::new();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    in_flight.retain(|handle| !handle.is_finished());
                    let orchestrator = Arc::clone(&self.orchestrator);
                    in_flight.push(tokio::spawn(async move { orchestrator.run_cycle().await }));
                    debug!(in_flight = in_flight.len(), "Cycle spawned");
                }
            }
        }

        self.drain(in_flight).await
    }

    async fn drain(&self, mut in_flight: Vec<JoinHandle<CycleOutcome>>) -> usize {
        in_flight.retain(|handle| !handle.is_finished());
        if in_flight.is_empty() {
            info!("Scheduler stopped");
            return 0;
        }

        info!(
            in_flight = in_flight.len(),
            grace_secs = self.grace.as_secs(),
            "Waiting for in-flight cycle"
        );
        if tokio::time::timeout(self.grace, join_all(in_flight.iter_mut()))
            .await
            .is_ok()
        {
            info!("Scheduler stopped");
            return 0;
        }

        let abandoned = in_flight.iter().filter(|h| !h.is_finished()).count();
        for handle in &in_flight {
            handle.abort();
        }
        warn!(abandoned, "Shutdown grace period elapsed, abandoning cycle");
        abandoned
    }
}
