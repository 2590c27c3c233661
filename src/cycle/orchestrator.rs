//! Single fetch → transform → publish pass with skip-on-overrun.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::{Days, NaiveDate};
use tracing::{Instrument, error, info, warn};

use super::{CycleOutcome, CycleReport, CycleStage, CycleState};
use crate::billing::{BillingSource, CostQuery};
use crate::bus::Publisher;
use crate::clock::{Clock, SystemClock};
use crate::config::ServiceConfig;
use crate::observability::{CycleMetrics, CycleSpan, SpanContext};
use crate::pipeline::{
    CategoryRegistry, CostReading, DifferentialStore, RecordTransformer, midnight_utc,
};
use crate::{Error, Result};

/// Resets the running flag when the cycle ends, including on panic or when
/// the cycle future is dropped.
struct RunningGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct CycleOrchestratorBuilder {
    config: ServiceConfig,
    billing: Arc<dyn BillingSource>,
    publisher: Publisher,
    clock: Option<Arc<dyn Clock>>,
    metrics: Option<Arc<CycleMetrics>>,
    registry: Option<Arc<CategoryRegistry>>,
    store: Option<Arc<DifferentialStore>>,
}

impl CycleOrchestratorBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn metrics(mut self, metrics: Arc<CycleMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(mut self, registry: Arc<CategoryRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn store(mut self, store: Arc<DifferentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> CycleOrchestrator {
        let mut transformer =
            RecordTransformer::new(self.config.emission_mode, self.config.netmon.clone());
        if let Some(registry) = self.registry {
            transformer = transformer.with_registry(registry);
        }
        if let Some(store) = self.store {
            transformer = transformer.with_store(store);
        }

        CycleOrchestrator {
            billing: self.billing,
            publisher: self.publisher,
            transformer,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            metrics: self.metrics.unwrap_or_default(),
            spans: SpanContext::new(),
            running: AtomicBool::new(false),
            config: self.config,
        }
    }
}

/// Runs cycles one at a time; a call made while another is in flight
/// returns [`CycleOutcome::Skipped`] immediately.
pub struct CycleOrchestrator {
    config: ServiceConfig,
    billing: Arc<dyn BillingSource>,
    publisher: Publisher,
    transformer: RecordTransformer,
    clock: Arc<dyn Clock>,
    metrics: Arc<CycleMetrics>,
    spans: SpanContext,
    running: AtomicBool,
}

impl CycleOrchestrator {
    pub fn builder(
        config: ServiceConfig,
        billing: Arc<dyn BillingSource>,
        publisher: Publisher,
    ) -> CycleOrchestratorBuilder {
        CycleOrchestratorBuilder {
            config,
            billing,
            publisher,
            clock: None,
            metrics: None,
            registry: None,
            store: None,
        }
    }

    pub fn state(&self) -> CycleState {
        if self.running.load(Ordering::Acquire) {
            CycleState::Running
        } else {
            CycleState::Idle
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<CycleMetrics> {
        &self.metrics
    }

    pub fn store(&self) -> &Arc<DifferentialStore> {
        self.transformer.store()
    }

    pub async fn run_cycle(&self) -> CycleOutcome {
        let Some(_guard) = RunningGuard::acquire(&self.running) else {
            warn!("Previous cycle still running, skipping this tick");
            self.metrics.record_skip();
            return CycleOutcome::Skipped;
        };

        self.metrics.record_cycle_start();
        let span = self.spans.cycle_span(self.transformer.mode().as_str());
        let outcome = self
            .execute(&span)
            .instrument(span.span().clone())
            .await;
        span.finish(outcome.label());

        let summary = self.metrics.summary();
        info!(
            cycle_id = span.cycle_id(),
            outcome = %outcome,
            cycles_started = summary.cycles_started,
            cycles_failed = summary.cycles_failed,
            records_published = summary.records_published,
            "Cycle finished"
        );
        outcome
    }

    async fn execute(&self, span: &CycleSpan) -> CycleOutcome {
        let started = Instant::now();
        let today = self.clock.today();
        let evicted = self.evict_stale(today);

        let query = CostQuery::lookback(
            today,
            self.config.lookback_days,
            self.config.granularity,
            self.config.group_by.clone(),
        );

        let readings = match self.fetch(&query).await {
            Ok(readings) => readings,
            Err(error) => return self.fail(CycleStage::Fetch, error, started),
        };
        span.record_readings(readings.len());
        self.metrics.record_fetch(readings.len());

        if readings.is_empty() {
            info!("No cost data to publish");
            self.metrics.record_empty(started.elapsed());
            return CycleOutcome::Empty;
        }

        let output = self.transformer.transform(&readings);
        self.metrics
            .record_transform(output.skipped.len(), output.failures.len());
        if !output.skipped.is_empty() {
            info!(
                suppressed = output.skipped.len(),
                "Suppressed readings without a positive change"
            );
        }

        // Baselines advance only once the bus has taken the records, so an
        // undelivered batch is recomputed in full on the next cycle.
        let published = match self.publisher.publish(&output.records).await {
            Ok(published) => published,
            Err(error) => return self.fail(CycleStage::Publish, error, started),
        };
        self.transformer.commit(&output);
        span.record_published(published);
        self.metrics.record_published(published, started.elapsed());

        CycleOutcome::Published(CycleReport {
            readings: readings.len(),
            published,
            suppressed: output.skipped.len(),
            failed: output.failures.len(),
            evicted,
            duration: started.elapsed(),
        })
    }

    async fn fetch(&self, query: &CostQuery) -> Result<Vec<CostReading>> {
        let timeout = self.config.fetch_timeout;
        tokio::time::timeout(timeout, self.billing.fetch(query))
            .await
            .map_err(|_| Error::Timeout {
                operation: "fetch",
                duration: timeout,
            })?
    }

    /// Drops store entries for periods before the lookback window.
    fn evict_stale(&self, today: NaiveDate) -> usize {
        let Some(cutoff) = today.checked_sub_days(Days::new(u64::from(self.config.lookback_days)))
        else {
            return 0;
        };
        let evicted = self.store().evict_before(midnight_utc(cutoff));
        if evicted > 0 {
            info!(evicted, cutoff = %cutoff, "Evicted stale cost baselines");
        }
        evicted
    }

    fn fail(&self, stage: CycleStage, error: Error, started: Instant) -> CycleOutcome {
        error!(stage = %stage, category = ?error.category(), error = %error, "Cycle failed");
        self.metrics.record_failure(started.elapsed());
        CycleOutcome::Failed { stage, error }
    }
}

impl std::fmt::Debug for CycleOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleOrchestrator")
            .field("billing", &self.billing.name())
            .field("publisher", &self.publisher)
            .field("mode", &self.transformer.mode())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
