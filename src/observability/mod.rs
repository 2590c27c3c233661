//! Logging and in-process metrics.
//!
//! Log output goes through `tracing`; [`init_tracing`] installs a formatting
//! subscriber whose filter comes from `RUST_LOG` when set and from the
//! configured level otherwise.

mod metrics;
mod spans;

pub use metrics::{Counter, CycleMetrics, Gauge, MetricsSummary};
pub use spans::{CycleSpan, SpanContext};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the fallback filter directive.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Builds the filter: `RUST_LOG`, then `level`, then `info`.
pub fn env_filter(level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(level))
}

/// Filter for a configured level directive. Invalid directives fall back to `info`.
fn level_filter(level: Option<&str>) -> EnvFilter {
    EnvFilter::try_new(level.unwrap_or(DEFAULT_LOG_LEVEL))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

/// Installs the global subscriber. Fails if one is already set.
pub fn init_tracing(level: Option<&str>) -> Result<(), String> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false);

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(fmt_layer)
        .try_init()
        .map_err(|e| format!("Failed to init subscriber: {}", e))
}
