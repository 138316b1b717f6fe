// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use streamsync_core::{
    HttpExecutor, PollScheduler, RetryCoordinator, Snapshot, SnapshotSummary, StateAggregator,
    StateStore, SyncConfig, SyncObserver, TcpLivenessProbe,
};

/// Logs a one-line summary whenever the served snapshot changes shape.
#[derive(Default)]
struct StatusLine {
    last: Mutex<Option<SnapshotSummary>>,
}

impl SyncObserver for StatusLine {
    fn on_snapshot_replaced(&self, snapshot: &Snapshot, generation: u64) {
        let summary = snapshot.summary();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if last.as_ref() == Some(&summary) {
            debug!(generation, "{summary}");
        } else {
            info!(generation, "{summary}");
            *last = Some(summary);
        }
    }
}

const DEFAULT_LOG_LEVEL: &str = "info";

fn env_filter_directive(log_level: &str) -> String {
    format!("h2=off,hyper=off,rustls=off,{}", log_level)
}

fn subscriber_for(log_level: &str) -> impl tracing::Subscriber + Send + Sync + 'static {
    #[allow(clippy::expect_used)]
    tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter_directive(log_level))
                .expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish()
}

#[tokio::main]
pub async fn main() {
    // Fallback warnings emitted while reading the environment go through a
    // default-level subscriber; the configured level applies afterwards.
    let loaded =
        tracing::subscriber::with_default(subscriber_for(DEFAULT_LOG_LEVEL), SyncConfig::from_env);
    let log_level = loaded
        .as_ref()
        .map_or(DEFAULT_LOG_LEVEL, |config| config.log_level.as_str());

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber_for(log_level))
        .expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}. Shutting down.");
            return;
        }
    };

    let executor = match HttpExecutor::new(&config) {
        Ok(executor) => Arc::new(executor),
        Err(e) => {
            error!("Unable to build HTTP client: {e}. Shutting down.");
            return;
        }
    };

    let probe = match TcpLivenessProbe::from_config(&config) {
        Ok(probe) => Arc::new(probe),
        Err(e) => {
            error!("Unable to build liveness probe: {e}. Shutting down.");
            return;
        }
    };

    let cancel = CancellationToken::new();
    let retry = RetryCoordinator::from_config(executor, &config, cancel.clone());
    let store = Arc::new(StateStore::new());

    let handle = PollScheduler::new(
        StateAggregator::new(retry),
        Arc::clone(&store),
        config.poll_interval,
    )
    .with_probe(probe)
    .with_observer(Arc::new(StatusLine::default()))
    .with_cancellation(cancel)
    .start();

    info!(
        api_url = %config.api_url,
        interval_secs = config.poll_interval.as_secs(),
        "syncing streaming server state"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {e}");
    }

    info!("shutting down");
    handle.shutdown().await;
    debug!(generation = store.generation(), "last snapshot generation");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_uses_configured_level() {
        let config = SyncConfig::from_lookup(|key| {
            (key == "STREAMSYNC_LOG_LEVEL").then(|| "WARN".to_string())
        })
        .expect("valid config");

        let directive = env_filter_directive(&config.log_level);
        assert_eq!(directive, "h2=off,hyper=off,rustls=off,warn");
        assert!(EnvFilter::try_new(directive).is_ok());
    }

    #[test]
    fn test_every_accepted_level_builds_a_filter() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(EnvFilter::try_new(env_filter_directive(level)).is_ok(), "{level}");
        }
    }
}
