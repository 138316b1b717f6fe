// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded retries for the aggregate sync call.
//!
//! Only connection-establishment failures are retried, with a linear,
//! un-jittered backoff (`k * step` before retry `k`). Mutating commands never
//! go through this path.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::RequestError;
use crate::http::{ApiResponse, CommandExecutor, RequestTimeout};

#[derive(Clone)]
pub struct RetryCoordinator {
    executor: Arc<dyn CommandExecutor>,
    max_retries: u32,
    step: Duration,
    cancel: CancellationToken,
}

impl std::fmt::Debug for RetryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryCoordinator")
            .field("max_retries", &self.max_retries)
            .field("step", &self.step)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl RetryCoordinator {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        max_retries: u32,
        step: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            executor,
            max_retries,
            step,
            cancel,
        }
    }

    pub fn from_config(
        executor: Arc<dyn CommandExecutor>,
        config: &SyncConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self::new(executor, config.max_sync_retries, config.retry_step, cancel)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay waited before retry `attempt` (1-indexed).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt)
    }

    /// Executes `command`, retrying up to `max_retries` times while the
    /// failure is a connection failure. Any other failure, an exhausted
    /// budget, or a cancelled delay returns the last error unchanged.
    pub async fn execute_with_retry(&self, command: &Value) -> Result<ApiResponse, RequestError> {
        let mut attempt = 0u32;
        loop {
            let err = match self.executor.execute(command, RequestTimeout::Query).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            if !err.is_transient() {
                return Err(err);
            }
            if attempt >= self.max_retries {
                warn!(
                    %err,
                    retries = attempt,
                    "sync request retry budget exhausted"
                );
                return Err(err);
            }

            attempt += 1;
            let delay = self.backoff_delay(attempt);
            debug!(
                %err,
                retry = attempt,
                delay_ms = delay.as_millis() as u64,
                "sync request failed to connect; retrying"
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(retry = attempt, "retry delay abandoned on shutdown");
                    return Err(err);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
