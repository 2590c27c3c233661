//! In-process cycle counters.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// Thread-safe atomic counter.
#[derive(Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Thread-safe atomic gauge.
#[derive(Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Counters for the fetch → transform → publish loop.
///
/// Shared between the orchestrator and whoever reports on it; every field is
/// monotonic except `last_cycle_ms` and `last_published`.
#[derive(Default)]
pub struct CycleMetrics {
    pub cycles_started: Counter,
    pub cycles_skipped: Counter,
    pub cycles_empty: Counter,
    pub cycles_published: Counter,
    pub cycles_failed: Counter,
    pub readings_fetched: Counter,
    pub records_published: Counter,
    pub readings_suppressed: Counter,
    pub transform_failures: Counter,
    pub last_cycle_ms: Gauge,
    pub last_published: Gauge,
}

impl CycleMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle_start(&self) {
        self.cycles_started.inc();
    }

    pub fn record_skip(&self) {
        self.cycles_skipped.inc();
    }

    pub fn record_empty(&self, elapsed: Duration) {
        self.cycles_empty.inc();
        self.last_published.set(0);
        self.record_elapsed(elapsed);
    }

    pub fn record_fetch(&self, readings: usize) {
        self.readings_fetched.add(readings as u64);
    }

    pub fn record_transform(&self, suppressed: usize, failures: usize) {
        self.readings_suppressed.add(suppressed as u64);
        self.transform_failures.add(failures as u64);
    }

    pub fn record_published(&self, published: usize, elapsed: Duration) {
        self.cycles_published.inc();
        self.records_published.add(published as u64);
        self.last_published.set(published as i64);
        self.record_elapsed(elapsed);
    }

    pub fn record_failure(&self, elapsed: Duration) {
        self.cycles_failed.inc();
        self.record_elapsed(elapsed);
    }

    fn record_elapsed(&self, elapsed: Duration) {
        self.last_cycle_ms
            .set(i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX));
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary::from_metrics(self)
    }
}

/// Point-in-time copy of [`CycleMetrics`] for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSummary {
    pub cycles_started: u64,
    pub cycles_skipped: u64,
    pub cycles_empty: u64,
    pub cycles_published: u64,
    pub cycles_failed: u64,
    pub readings_fetched: u64,
    pub records_published: u64,
    pub readings_suppressed: u64,
    pub transform_failures: u64,
}

impl MetricsSummary {
    pub fn from_metrics(metrics: &CycleMetrics) -> Self {
        Self {
            cycles_started: metrics.cycles_started.get(),
            cycles_skipped: metrics.cycles_skipped.get(),
            cycles_empty: metrics.cycles_empty.get(),
            cycles_published: metrics.cycles_published.get(),
            cycles_failed: metrics.cycles_failed.get(),
            readings_fetched: metrics.readings_fetched.get(),
            records_published: metrics.records_published.get(),
            readings_suppressed: metrics.readings_suppressed.get(),
            transform_failures: metrics.transform_failures.get(),
        }
    }
}
