//! Configuration Provider Trait

use std::str::FromStr;

use super::{ConfigError, ConfigResult};

/// Read-only source of raw configuration values keyed by dotted names
/// (`kafka.topic`, `lookback.days`).
#[async_trait::async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Get a raw configuration value
    async fn get_raw(&self, key: &str) -> ConfigResult<Option<String>>;
}

/// Extension methods for typed configuration access
pub trait ConfigProviderExt: ConfigProvider {
    /// Get a value parsed with [`FromStr`]. Blank values count as unset.
    fn get<T>(&self, key: &str) -> impl std::future::Future<Output = ConfigResult<Option<T>>> + Send
    where
        Self: Sync,
        T: FromStr + Send,
        T::Err: std::fmt::Display,
    {
        async move {
            match self.get_raw(key).await? {
                Some(raw) if !raw.trim().is_empty() => {
                    raw.trim()
                        .parse::<T>()
                        .map(Some)
                        .map_err(|e| ConfigError::InvalidValue {
                            key: key.to_string(),
                            message: e.to_string(),
                        })
                }
                _ => Ok(None),
            }
        }
    }
}

impl<P: ConfigProvider + ?Sized> ConfigProviderExt for P {}
