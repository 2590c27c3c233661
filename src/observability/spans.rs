//! Structured spans for scheduled cycles.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::{Level, Span, field, span};

/// Hands out monotonically increasing cycle ids.
#[derive(Default)]
pub struct SpanContext {
    cycle_id: AtomicU64,
}

impl SpanContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_cycle_id(&self) -> u64 {
        self.cycle_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn cycle_span(&self, mode: &str) -> CycleSpan {
        CycleSpan::new(self.next_cycle_id(), mode)
    }
}

/// Span covering one fetch → transform → publish pass.
pub struct CycleSpan {
    span: Span,
    cycle_id: u64,
    start: Instant,
}

impl CycleSpan {
    pub fn new(cycle_id: u64, mode: &str) -> Self {
        let span = span!(
            Level::INFO,
            "cycle.run",
            cycle_id = cycle_id,
            emission_mode = mode,
            readings = field::Empty,
            published = field::Empty,
            outcome = field::Empty,
            duration_ms = field::Empty,
        );
        Self {
            span,
            cycle_id,
            start: Instant::now(),
        }
    }

    pub fn cycle_id(&self) -> u64 {
        self.cycle_id
    }

    pub fn record_readings(&self, readings: usize) {
        self.span.record("readings", readings);
    }

    pub fn record_published(&self, published: usize) {
        self.span.record("published", published);
    }

    pub fn finish(&self, outcome: &str) {
        self.span.record("outcome", outcome);
        self.span
            .record("duration_ms", self.start.elapsed().as_millis() as u64);
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}
