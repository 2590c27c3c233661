//! Kafka REST Proxy (v2 API) producer using the binary embedded format.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::MessageBus;
use crate::config::BusConfig;
use crate::pipeline::OutboundRecord;
use crate::{Error, Result};

const CONTENT_TYPE: &str = "application/vnd.kafka.binary.v2+json";
const ACCEPT: &str = "application/vnd.kafka.v2+json";

#[derive(Serialize)]
struct ProduceRequest {
    records: Vec<ProduceRecord>,
}

/// Key and value are base64 encoded in the binary embedded format.
#[derive(Serialize)]
struct ProduceRecord {
    key: String,
    value: String,
}

impl ProduceRecord {
    fn from_record(record: &OutboundRecord) -> Self {
        Self {
            key: STANDARD.encode(record.key.as_bytes()),
            value: STANDARD.encode(&record.value),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProduceResponse {
    #[serde(default)]
    offsets: Vec<PartitionOffset>,
}

#[derive(Debug, Deserialize)]
struct PartitionOffset {
    #[serde(default)]
    partition: Option<i32>,
    #[serde(default)]
    offset: Option<i64>,
    #[serde(default)]
    error_code: Option<i32>,
    #[serde(default)]
    error: Option<String>,
}

impl PartitionOffset {
    fn failed(&self) -> bool {
        self.error_code.is_some() || self.error.is_some()
    }
}

pub struct RestProxyBus {
    http: reqwest::Client,
    base_url: Url,
    username: Option<String>,
    password: Option<SecretString>,
}

impl RestProxyBus {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: with_trailing_slash(base_url),
            username: None,
            password: None,
        }
    }

    pub fn from_config(config: &BusConfig) -> Self {
        let bus = Self::new(config.rest_url.clone());
        match (&config.username, &config.password) {
            (Some(username), Some(password)) => bus.with_basic_auth(username, password.clone()),
            _ => bus,
        }
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.username = Some(username.into());
        self.password = Some(password);
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn topic_url(&self, topic: &str) -> Result<Url> {
        self.base_url
            .join(&format!("topics/{}", urlencoding::encode(topic)))
            .map_err(|e| Error::publish(format!("invalid topic URL: {}", e), 0, 0))
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

impl std::fmt::Debug for RestProxyBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestProxyBus")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MessageBus for RestProxyBus {
    fn name(&self) -> &str {
        "kafka-rest-proxy"
    }

    async fn send(&self, topic: &str, records: &[OutboundRecord]) -> Result<usize> {
        let attempted = records.len();
        let url = self.topic_url(topic)?;
        let body = ProduceRequest {
            records: records.iter().map(ProduceRecord::from_record).collect(),
        };

        let mut request = self
            .http
            .post(url)
            .header("Content-Type", CONTENT_TYPE)
            .header("Accept", ACCEPT)
            .body(serde_json::to_vec(&body)?);
        if let Some(ref username) = self.username {
            request = request.basic_auth(
                username,
                self.password.as_ref().map(|p| p.expose_secret().to_string()),
            );
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::publish(e.to_string(), 0, attempted))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::publish(e.to_string(), 0, attempted))?;
        if !status.is_success() {
            return Err(Error::publish(
                format!("REST proxy returned {}: {}", status.as_u16(), text),
                0,
                attempted,
            ));
        }

        let parsed: ProduceResponse = serde_json::from_str(&text).map_err(|e| {
            Error::publish(
                format!("unreadable REST proxy response: {}", e),
                0,
                attempted,
            )
        })?;
        let failures: Vec<&PartitionOffset> = parsed.offsets.iter().filter(|o| o.failed()).collect();

        // One offset per record, in request order.
        if failures.is_empty() && parsed.offsets.len() == attempted {
            for offset in &parsed.offsets {
                debug!(partition = ?offset.partition, offset = ?offset.offset, "Message delivered");
            }
            return Ok(attempted);
        }

        let delivered = (parsed.offsets.len() - failures.len()).min(attempted);
        for failure in &failures {
            warn!(
                error_code = ?failure.error_code,
                error = failure.error.as_deref().unwrap_or(""),
                "Message delivery failed"
            );
        }
        let message = match failures.first() {
            Some(failure) => failure
                .error
                .clone()
                .unwrap_or_else(|| "delivery rejected".to_string()),
            None => format!(
                "REST proxy acknowledged {} of {} records",
                parsed.offsets.len(),
                attempted
            ),
        };
        Err(Error::publish(message, delivered, attempted))
    }
}
