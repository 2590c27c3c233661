//! Typed service settings resolved from a [`ConfigProvider`].

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use super::provider::{ConfigProvider, ConfigProviderExt};
use super::{ConfigError, ConfigResult, ValidationErrors};
use crate::billing::Granularity;
use crate::pipeline::{EmissionMode, NetmonConstants};

const DEFAULT_INTERVAL_MINUTES: u64 = 60;
const DEFAULT_LOOKBACK_DAYS: u32 = 1;
const MAX_LOOKBACK_DAYS: u32 = 365;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REST_URL: &str = "http://localhost:8082";

/// Kafka REST Proxy connection settings.
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub rest_url: Url,
    pub topic: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            rest_url: Url::parse(DEFAULT_REST_URL).expect("default REST proxy URL is valid"),
            topic: "aws-costs".into(),
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub interval: Duration,
    pub lookback_days: u32,
    pub granularity: Granularity,
    pub group_by: String,
    pub emission_mode: EmissionMode,
    pub netmon: NetmonConstants,
    pub aws_region: String,
    pub bus: BusConfig,
    pub fetch_timeout: Duration,
    pub publish_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_MINUTES * 60),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            granularity: Granularity::Daily,
            group_by: "SERVICE".into(),
            emission_mode: EmissionMode::Absolute,
            netmon: NetmonConstants::default(),
            aws_region: "eu-west-1".into(),
            bus: BusConfig::default(),
            fetch_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            publish_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            shutdown_grace: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ServiceConfig {
    /// Resolves every setting, collecting all invalid keys before failing.
    pub async fn load<P: ConfigProvider + ?Sized>(provider: &P) -> ConfigResult<Self> {
        let mut reader = FieldReader {
            provider,
            errors: Vec::new(),
        };
        let defaults = Self::default();

        let interval_minutes = reader
            .ranged("fetch.interval.minutes", DEFAULT_INTERVAL_MINUTES, 1..=10_080)
            .await;
        let lookback_days = reader
            .ranged("lookback.days", DEFAULT_LOOKBACK_DAYS, 1..=MAX_LOOKBACK_DAYS)
            .await;
        let granularity = reader.parsed("granularity", defaults.granularity).await;
        let group_by = reader.string("group.by", &defaults.group_by).await;
        let emission_mode = reader.parsed("emission.mode", defaults.emission_mode).await;

        let netmon = NetmonConstants {
            ip: reader.string("netmon.ip", &defaults.netmon.ip).await,
            vlan: reader.string("netmon.vlan", &defaults.netmon.vlan).await,
            dir: reader.parsed("netmon.dir", defaults.netmon.dir).await,
            sim: reader.string("netmon.sim", &defaults.netmon.sim).await,
        };

        let aws_region = reader.string("aws.region", &defaults.aws_region).await;

        // Records go through a REST Proxy; broker addresses alone cannot be used.
        let rest_url = reader.optional::<Url>("kafka.rest.url").await;
        let brokers = reader.optional::<String>("kafka.brokers").await;
        if rest_url.is_none() && brokers.is_some() {
            reader.errors.push(ConfigError::InvalidValue {
                key: "kafka.brokers".into(),
                message: "direct broker connections are not supported, set KAFKA_REST_URL to a Kafka REST Proxy".into(),
            });
        }
        let rest_url = rest_url.unwrap_or(defaults.bus.rest_url);
        let topic = reader.string("kafka.topic", &defaults.bus.topic).await;
        let username = reader.optional::<String>("kafka.username").await;
        let password = reader
            .optional::<String>("kafka.password")
            .await
            .map(SecretString::from);
        if username.is_some() != password.is_some() {
            reader.errors.push(ConfigError::InvalidValue {
                key: "kafka.username".into(),
                message: "KAFKA_USERNAME and KAFKA_PASSWORD must be set together".into(),
            });
        }

        let fetch_timeout = reader
            .ranged("fetch.timeout.seconds", DEFAULT_TIMEOUT_SECS, 1..=3_600)
            .await;
        let publish_timeout = reader
            .ranged("publish.timeout.seconds", DEFAULT_TIMEOUT_SECS, 1..=3_600)
            .await;
        let shutdown_grace = reader
            .ranged("shutdown.grace.seconds", DEFAULT_TIMEOUT_SECS, 0..=3_600)
            .await;

        if !reader.errors.is_empty() {
            return Err(ConfigError::ValidationErrors(ValidationErrors(reader.errors)));
        }

        Ok(Self {
            interval: Duration::from_secs(interval_minutes * 60),
            lookback_days,
            granularity,
            group_by,
            emission_mode,
            netmon,
            aws_region,
            bus: BusConfig {
                rest_url,
                topic,
                username,
                password,
            },
            fetch_timeout: Duration::from_secs(fetch_timeout),
            publish_timeout: Duration::from_secs(publish_timeout),
            shutdown_grace: Duration::from_secs(shutdown_grace),
        })
    }
}

struct FieldReader<'a, P: ?Sized> {
    provider: &'a P,
    errors: Vec<ConfigError>,
}

impl<P: ConfigProvider + ?Sized> FieldReader<'_, P> {
    async fn optional<T>(&mut self, key: &str) -> Option<T>
    where
        T: FromStr + Send,
        T::Err: Display,
    {
        match self.provider.get::<T>(key).await {
            Ok(value) => value,
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    async fn parsed<T>(&mut self, key: &str, default: T) -> T
    where
        T: FromStr + Send,
        T::Err: Display,
    {
        self.optional(key).await.unwrap_or(default)
    }

    async fn string(&mut self, key: &str, default: &str) -> String {
        self.parsed(key, default.to_string()).await
    }

    async fn ranged<T>(&mut self, key: &str, default: T, range: std::ops::RangeInclusive<T>) -> T
    where
        T: FromStr + Send + PartialOrd + Display + Copy,
        T::Err: Display,
    {
        let value = self.parsed(key, default).await;
        if range.contains(&value) {
            value
        } else {
            self.errors.push(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!(
                    "value {} not in range {}..={}",
                    value,
                    range.start(),
                    range.end()
                ),
            });
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigProvider;
    use secrecy::ExposeSecret;

    #[tokio::test]
    async fn test_defaults_from_empty_provider() {
        let config = ServiceConfig::load(&MemoryConfigProvider::new()).await.unwrap();

        assert_eq!(config.interval, Duration::from_secs(3600));
        assert_eq!(config.lookback_days, 1);
        assert_eq!(config.granularity, Granularity::Daily);
        assert_eq!(config.group_by, "SERVICE");
        assert_eq!(config.emission_mode, EmissionMode::Absolute);
        assert_eq!(config.netmon, NetmonConstants::default());
        assert_eq!(config.bus.topic, "aws-costs");
        assert_eq!(config.bus.rest_url.as_str(), "http://localhost:8082/");
        assert!(config.bus.username.is_none());
    }

    #[tokio::test]
    async fn test_explicit_values() {
        let provider = MemoryConfigProvider::new()
            .value("fetch.interval.minutes", "5")
            .value("lookback.days", "7")
            .value("granularity", "monthly")
            .value("emission.mode", "DIFFERENTIAL")
            .value("netmon.ip", "10.8.193.94")
            .value("netmon.vlan", "TEAMSYSTEM")
            .value("netmon.dir", "1")
            .value("netmon.sim", "393488628060")
            .value("kafka.rest.url", "https://kafka-rest.internal:8082")
            .value("kafka.topic", "billing")
            .value("kafka.username", "svc")
            .value("kafka.password", "hunter2")
            .value("shutdown.grace.seconds", "0");

        let config = ServiceConfig::load(&provider).await.unwrap();

        assert_eq!(config.interval, Duration::from_secs(300));
        assert_eq!(config.lookback_days, 7);
        assert_eq!(config.granularity, Granularity::Monthly);
        assert_eq!(config.emission_mode, EmissionMode::Differential);
        assert_eq!(config.netmon.dir, 1);
        assert_eq!(config.netmon.vlan, "TEAMSYSTEM");
        assert_eq!(config.bus.rest_url.host_str(), Some("kafka-rest.internal"));
        assert_eq!(config.bus.username.as_deref(), Some("svc"));
        assert_eq!(
            config.bus.password.as_ref().map(|p| p.expose_secret()),
            Some("hunter2")
        );
        assert_eq!(config.shutdown_grace, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_password_is_redacted_in_debug() {
        let provider = MemoryConfigProvider::new()
            .value("kafka.username", "svc")
            .value("kafka.password", "hunter2");
        let config = ServiceConfig::load(&provider).await.unwrap();
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[tokio::test]
    async fn test_all_errors_are_collected() {
        let provider = MemoryConfigProvider::new()
            .value("lookback.days", "0")
            .value("granularity", "WEEKLY")
            .value("emission.mode", "delta")
            .value("netmon.dir", "inbound")
            .value("kafka.rest.url", "not a url")
            .value("kafka.username", "svc");

        let err = ServiceConfig::load(&provider).await.unwrap_err();
        let ConfigError::ValidationErrors(ValidationErrors(errors)) = &err else {
            panic!("expected validation errors, got {:?}", err);
        };
        assert_eq!(errors.len(), 6);

        let message = err.to_string();
        for key in [
            "lookback.days",
            "granularity",
            "emission.mode",
            "netmon.dir",
            "kafka.rest.url",
            "kafka.username",
        ] {
            assert!(message.contains(key), "missing {} in {}", key, message);
        }
    }

    #[tokio::test]
    async fn test_blank_values_use_defaults() {
        let provider = MemoryConfigProvider::new()
            .value("kafka.topic", "  ")
            .value("lookback.days", "");
        let config = ServiceConfig::load(&provider).await.unwrap();
        assert_eq!(config.bus.topic, "aws-costs");
        assert_eq!(config.lookback_days, 1);
    }

    #[tokio::test]
    async fn test_brokers_without_rest_proxy_are_rejected() {
        let provider = MemoryConfigProvider::new().value("kafka.brokers", "broker-1:9092");
        let err = ServiceConfig::load(&provider).await.unwrap_err();
        assert!(err.to_string().contains("kafka.brokers"));
        assert!(err.to_string().contains("KAFKA_REST_URL"));

        let provider = MemoryConfigProvider::new()
            .value("kafka.brokers", "broker-1:9092")
            .value("kafka.rest.url", "http://kafka-rest:8082");
        let config = ServiceConfig::load(&provider).await.unwrap();
        assert_eq!(config.bus.rest_url.host_str(), Some("kafka-rest"));
    }
}
