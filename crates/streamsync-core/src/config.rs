// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ConfigError;
use std::env;
use std::time::Duration;
use tracing::warn;

/// Control endpoint of a locally running server.
pub const DEFAULT_API_URL: &str = "http://localhost:4242/api";
/// Timeout applied to read-only queries.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout applied to commands known to be slow (software updates).
pub const DEFAULT_UPDATE_TIMEOUT: Duration = Duration::from_secs(30);
/// Cadence of the background sync.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
/// Retries granted to the aggregate sync call on connection failures.
pub const DEFAULT_MAX_SYNC_RETRIES: u32 = 3;
/// Delay unit of the linear retry backoff (retry `k` waits `k * step`).
pub const DEFAULT_RETRY_STEP: Duration = Duration::from_secs(2);
/// Connect timeout of the TCP liveness probe.
pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_secs(1);

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration for the state synchronization engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Full URL of the control endpoint (`POST` target)
    pub api_url: String,
    /// Timeout for read-only queries
    pub query_timeout: Duration,
    /// Timeout for long-running commands such as `update`
    pub update_timeout: Duration,
    /// Interval between poll cycles
    pub poll_interval: Duration,
    /// Maximum number of retries of the aggregate sync call
    pub max_sync_retries: u32,
    /// Linear backoff step between sync retries
    pub retry_step: Duration,
    /// Connect timeout used by the liveness probe
    pub liveness_timeout: Duration,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            update_timeout: DEFAULT_UPDATE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_sync_retries: DEFAULT_MAX_SYNC_RETRIES,
            retry_step: DEFAULT_RETRY_STEP,
            liveness_timeout: DEFAULT_LIVENESS_TIMEOUT,
            log_level: "info".to_string(),
        }
    }
}

impl SyncConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup, falling back to
    /// defaults for missing or unparsable values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_url = lookup("STREAMSYNC_API_URL")
            .map(|url| url.trim().to_string())
            .unwrap_or(defaults.api_url);
        let query_timeout = secs_var(&lookup, "STREAMSYNC_QUERY_TIMEOUT_SECS")
            .unwrap_or(defaults.query_timeout);
        let update_timeout = secs_var(&lookup, "STREAMSYNC_UPDATE_TIMEOUT_SECS")
            .unwrap_or(defaults.update_timeout);
        let poll_interval = secs_var(&lookup, "STREAMSYNC_POLL_INTERVAL_SECS")
            .unwrap_or(defaults.poll_interval);
        let max_sync_retries = lookup("STREAMSYNC_MAX_SYNC_RETRIES")
            .and_then(|val| parse_or_warn::<u32>("STREAMSYNC_MAX_SYNC_RETRIES", &val))
            .unwrap_or(defaults.max_sync_retries);
        let log_level = lookup("STREAMSYNC_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or(defaults.log_level);

        let config = Self {
            api_url,
            query_timeout,
            update_timeout,
            poll_interval,
            max_sync_retries,
            log_level,
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_url.trim();
        if url.is_empty() {
            return Err(ConfigError::Invalid("API URL cannot be empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "API URL '{url}' must use http or https"
            )));
        }

        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "poll interval must be greater than 0".to_string(),
            ));
        }

        if self.query_timeout.is_zero() || self.update_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request timeouts must be greater than 0".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }

    /// Returns the `host:port` pair of the control endpoint, used by the
    /// TCP liveness probe.
    pub fn api_authority(&self) -> Option<String> {
        let url = reqwest::Url::parse(&self.api_url).ok()?;
        let host = url.host_str()?;
        let port = url.port_or_known_default()?;
        Some(format!("{host}:{port}"))
    }
}

fn secs_var<F>(lookup: &F, key: &str) -> Option<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|val| parse_or_warn::<u64>(key, &val))
        .map(Duration::from_secs)
}

fn parse_or_warn<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    match value.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("ignoring unparsable value '{value}' for {key}; using default");
            None
        }
    }
}
