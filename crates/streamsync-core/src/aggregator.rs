// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde_json::{json, Value};
use tracing::debug;

use crate::error::RequestError;
use crate::retry::RetryCoordinator;
use crate::snapshot::Snapshot;

/// Fields requested for every connected client.
pub const CLIENT_FIELDS: [&str; 5] = ["host", "stream", "protocol", "conntime", "sessId"];

/// The single combined query that retrieves every facet in one round trip.
pub fn sync_command() -> Value {
    json!({
        "active_streams": true,
        "streams": true,
        "stats_streams": true,
        "push_list": true,
        "clients": { "fields": CLIENT_FIELDS },
    })
}

/// Issues the aggregate sync call and turns its response into a [`Snapshot`].
#[derive(Debug, Clone)]
pub struct StateAggregator {
    retry: RetryCoordinator,
}

impl StateAggregator {
    pub fn new(retry: RetryCoordinator) -> Self {
        Self { retry }
    }

    /// Fetches and normalizes the full server state. Errors come straight
    /// from the transport layer; normalization itself cannot fail.
    pub async fn refresh(&self) -> Result<Snapshot, RequestError> {
        let response = self.retry.execute_with_retry(&sync_command()).await?;
        let snapshot = Snapshot::from_response(&response);
        debug!(
            configured = snapshot.configured_streams.len(),
            active = snapshot.active_stream_names.len(),
            stats = snapshot.stream_stats.len(),
            pushes = snapshot.pushes.len(),
            clients = snapshot.clients.len(),
            protocols = snapshot.protocols.len(),
            "built snapshot from sync response"
        );
        Ok(snapshot)
    }
}
