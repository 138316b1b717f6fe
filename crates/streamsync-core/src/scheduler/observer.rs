// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Consumer notification hooks.
//!
//! Implement [`SyncObserver`] to react to snapshot replacements and poll
//! outcomes. Hooks run on the scheduler's control task, so they must return
//! quickly; read heavier state through [`crate::store::StateStore`] instead.

use std::fmt;

use crate::error::RequestError;
use crate::snapshot::Snapshot;

/// Why a poll cycle did not send a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The liveness probe reported the server as down.
    ServerNotRunning,
    /// The previous cycle had not resolved yet.
    CycleInFlight,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ServerNotRunning => f.write_str("server not running"),
            SkipReason::CycleInFlight => f.write_str("previous cycle still in flight"),
        }
    }
}

/// Hook invoked on scheduler events. Every method defaults to a no-op.
pub trait SyncObserver: Send + Sync {
    /// Called after the store swapped in `snapshot` as generation `generation`.
    fn on_snapshot_replaced(&self, _snapshot: &Snapshot, _generation: u64) {}
    /// Called when a refresh failed; the previous snapshot stays current.
    fn on_refresh_error(&self, _error: &RequestError) {}
    /// Called when a cycle was skipped without touching the network.
    fn on_cycle_skipped(&self, _reason: SkipReason) {}
}
