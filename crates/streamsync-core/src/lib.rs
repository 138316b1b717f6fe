// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! State synchronization engine for a streaming server's control API.
//!
//! The crate polls the server with a single aggregate query, normalizes each
//! loosely shaped facet of the response and publishes the result as an
//! immutable [`Snapshot`] through a [`StateStore`]. Mutating commands are
//! available through [`ControlClient`].

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod aggregator;
pub mod commands;
pub mod config;
pub mod error;
pub mod http;
pub mod normalize;
pub mod retry;
pub mod scheduler;
pub mod snapshot;
pub mod store;

#[cfg(test)]
mod test_support;

pub use aggregator::{sync_command, StateAggregator};
pub use commands::{Command, ControlClient};
pub use config::SyncConfig;
pub use error::{ConfigError, RequestError, TransportFailure};
pub use http::{ApiResponse, CommandExecutor, HttpExecutor, RequestTimeout};
pub use retry::RetryCoordinator;
pub use scheduler::{
    AlwaysRunning, LivenessProbe, PollScheduler, SchedulerHandle, SkipReason, SyncObserver,
    TcpLivenessProbe,
};
pub use snapshot::{
    ClientSession, ClientsFacet, ProtocolState, PushId, PushRecord, SessionId, Snapshot,
    SnapshotSummary, StreamConfig, StreamName, StreamStat, StreamStatus, Tags,
};
pub use store::StateStore;
