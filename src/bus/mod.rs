//! Message bus collaborator and the publisher adapter in front of it.

mod rest_proxy;

pub use rest_proxy::RestProxyBus;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::pipeline::OutboundRecord;
use crate::{Error, Result};

/// Transport that delivers keyed records to a topic.
#[async_trait]
pub trait MessageBus: Send + Sync {
    fn name(&self) -> &str;

    /// Sends `records` and returns how many were accepted. Partial delivery is
    /// reported as [`Error::Publish`] with the delivered count.
    async fn send(&self, topic: &str, records: &[OutboundRecord]) -> Result<usize>;
}

/// Forwards transformer output to a [`MessageBus`] without retrying.
#[derive(Clone)]
pub struct Publisher {
    bus: Arc<dyn MessageBus>,
    topic: String,
    timeout: Duration,
}

impl Publisher {
    pub fn new(bus: Arc<dyn MessageBus>, topic: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bus,
            topic: topic.into(),
            timeout,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publishes `records`; an empty slice succeeds with 0 and never reaches
    /// the bus.
    pub async fn publish(&self, records: &[OutboundRecord]) -> Result<usize> {
        if records.is_empty() {
            warn!("No messages to publish");
            return Ok(0);
        }

        info!(count = records.len(), topic = %self.topic, bus = self.bus.name(), "Publishing messages");

        let sent = tokio::time::timeout(self.timeout, self.bus.send(&self.topic, records))
            .await
            .map_err(|_| Error::Timeout {
                operation: "publish",
                duration: self.timeout,
            })??;

        info!(topic = %self.topic, messages_published = sent, "Messages published successfully");
        Ok(sent)
    }
}

impl std::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("bus", &self.bus.name())
            .field("topic", &self.topic)
            .field("timeout", &self.timeout)
            .finish()
    }
}
