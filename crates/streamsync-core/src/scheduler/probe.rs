// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::trace;

use crate::config::SyncConfig;
use crate::error::ConfigError;

/// Tells the scheduler whether the streaming server is up before a poll.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn is_running(&self) -> bool;
}

/// Probe that never skips a cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysRunning;

#[async_trait]
impl LivenessProbe for AlwaysRunning {
    async fn is_running(&self) -> bool {
        true
    }
}

/// Considers the server running when its control port accepts a TCP
/// connection within `timeout`.
#[derive(Debug, Clone)]
pub struct TcpLivenessProbe {
    authority: String,
    timeout: Duration,
}

impl TcpLivenessProbe {
    pub fn new(authority: impl Into<String>, timeout: Duration) -> Self {
        Self {
            authority: authority.into(),
            timeout,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, ConfigError> {
        let authority = config.api_authority().ok_or_else(|| {
            ConfigError::Invalid(format!(
                "cannot derive host and port from API URL '{}'",
                config.api_url
            ))
        })?;
        Ok(Self::new(authority, config.liveness_timeout))
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }
}

#[async_trait]
impl LivenessProbe for TcpLivenessProbe {
    async fn is_running(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.authority)).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                trace!(authority = %self.authority, %err, "liveness probe connect failed");
                false
            }
            Err(_) => {
                trace!(authority = %self.authority, "liveness probe timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_always_running() {
        assert!(AlwaysRunning.is_running().await);
    }

    #[tokio::test]
    async fn test_tcp_probe_sees_listening_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let probe = TcpLivenessProbe::new(addr.to_string(), Duration::from_secs(1));
        assert!(probe.is_running().await);
    }

    #[tokio::test]
    async fn test_tcp_probe_reports_closed_port() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let probe = TcpLivenessProbe::new(addr.to_string(), Duration::from_secs(1));
        assert!(!probe.is_running().await);
    }

    #[test]
    fn test_from_config_uses_api_authority() {
        let config = SyncConfig {
            api_url: "http://10.1.2.3:8080/api".to_string(),
            ..SyncConfig::default()
        };
        let probe = TcpLivenessProbe::from_config(&config).expect("probe");
        assert_eq!(probe.authority(), "10.1.2.3:8080");
        assert_eq!(probe.timeout, config.liveness_timeout);
    }

    #[test]
    fn test_from_config_rejects_unparsable_url() {
        let config = SyncConfig {
            api_url: "not a url".to_string(),
            ..SyncConfig::default()
        };
        assert!(TcpLivenessProbe::from_config(&config).is_err());
    }
}
