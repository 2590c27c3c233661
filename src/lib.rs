//! # cost-netmon
//!
//! Scheduled bridge that pulls cost data from AWS Cost Explorer, maps every
//! service to a NETMON protocol category, encodes amounts as integer cents and
//! publishes one event per (service, period) to Kafka.
//!
//! The pipeline is split into small pieces that can be driven independently:
//!
//! - [`pipeline`] holds the pure transform: category mapping, amount encoding,
//!   the differential store and the record transformer.
//! - [`billing`] and [`bus`] define the external collaborators as traits, with
//!   HTTP implementations for Cost Explorer and the Kafka REST Proxy.
//! - [`cycle`] drives fetch → transform → publish on a timer.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use cost_netmon::billing::BillingSource;
//! use cost_netmon::bus::{MessageBus, Publisher};
//! use cost_netmon::config::{ConfigBuilder, ServiceConfig};
//! use cost_netmon::cycle::CycleOrchestrator;
//!
//! # async fn example(
//! #     billing: Arc<dyn BillingSource>,
//! #     bus: Arc<dyn MessageBus>,
//! # ) -> Result<(), cost_netmon::Error> {
//! let provider = ConfigBuilder::new().env().build();
//! let config = ServiceConfig::load(&provider).await?;
//! let publisher = Publisher::new(bus, config.bus.topic.clone(), config.publish_timeout);
//! let orchestrator = CycleOrchestrator::builder(config, billing, publisher).build();
//! let outcome = orchestrator.run_cycle().await;
//! println!("{}", outcome);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod billing;
pub mod bus;
pub mod clock;
pub mod config;
pub mod cycle;
pub mod observability;
pub mod pipeline;

use std::time::Duration;

use rust_decimal::Decimal;

pub use billing::{BillingSource, CostQuery, Granularity};
#[cfg(feature = "aws")]
pub use billing::CostExplorerClient;
pub use bus::{MessageBus, Publisher, RestProxyBus};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, ServiceConfig};
pub use cycle::{CycleOrchestrator, CycleOutcome, CycleReport, CycleStage, CycleState, Scheduler};
pub use observability::CycleMetrics;
pub use pipeline::{
    CacheKey, CategoryInfo, CategoryRegistry, CostReading, DifferentialStore, EmissionMode,
    NetmonConstants, NetmonRecord, OutboundRecord, RecordTransformer, SkipReason,
    TransformOutput, encode_amount,
};

/// Error type for cost-netmon operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Billing fetch failed for a reason other than transport or status.
    #[error("Billing fetch failed: {0}")]
    Fetch(String),

    /// Remote endpoint returned a non-success status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Request signing or credential resolution failed.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// Network connectivity or request failed.
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Response body could not be interpreted.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Message bus rejected some or all records.
    #[error("Publish failed ({delivered}/{attempted} delivered): {message}")]
    Publish {
        message: String,
        delivered: usize,
        attempted: usize,
    },

    /// Amount cannot be represented as integer hundredths.
    #[error("Cannot encode amount {amount}: {reason}")]
    Encode {
        amount: Decimal,
        reason: &'static str,
    },

    /// Fetch or publish exceeded its configured timeout.
    #[error("{operation} timed out after {:.1}s", .duration.as_secs_f64())]
    Timeout {
        operation: &'static str,
        duration: Duration,
    },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Credential or signing failures
    Authorization,
    /// Configuration errors, fatal at startup
    Configuration,
    /// Network, timeout or 5xx errors that may clear by the next cycle
    Transient,
    /// Malformed upstream data or rejected records
    Data,
}

impl Error {
    pub fn auth(message: impl Into<String>) -> Self {
        Error::Auth {
            message: message.into(),
        }
    }

    pub fn publish(message: impl Into<String>, delivered: usize, attempted: usize) -> Self {
        Error::Publish {
            message: message.into(),
            delivered,
            attempted,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Auth { .. }
            | Error::Api {
                status: 401 | 403, ..
            } => ErrorCategory::Authorization,

            Error::Config(_) => ErrorCategory::Configuration,

            Error::Network(_)
            | Error::Timeout { .. }
            | Error::Api {
                status: 429 | 500..=599,
                ..
            } => ErrorCategory::Transient,

            Error::Fetch(_)
            | Error::Api { .. }
            | Error::Json(_)
            | Error::Parse(_)
            | Error::Publish { .. }
            | Error::Encode { .. } => ErrorCategory::Data,
        }
    }

    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn is_transient(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Number of records the bus accepted before failing, if this is a publish error.
    pub fn delivered(&self) -> Option<usize> {
        match self {
            Error::Publish { delivered, .. } => Some(*delivered),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
