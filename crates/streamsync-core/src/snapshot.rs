// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Canonical, immutable view of the server state.
//!
//! A [`Snapshot`] is built wholesale from one aggregate response and never
//! mutated afterwards. Cross references between facets (a live stream without
//! a config entry, a client on an unknown stream) are tolerated and resolve to
//! [`StreamStatus::Unknown`] rather than failing.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::http::ApiResponse;
use crate::normalize;

/// Name of a configured or live stream.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct StreamName(String);

impl StreamName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Server-assigned identifier of a push. Never interchangeable with a
/// [`StreamName`]; use [`Snapshot::pushes_for_stream`] to map one to the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PushId(u64);

impl PushId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PushId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one connected viewer session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Ordered set of tags; insertion order is preserved and duplicates dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Tags(Vec<String>);

impl Tags {
    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.0.contains(&tag) {
            return false;
        }
        self.0.push(tag);
        true
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tags = Tags::default();
        for tag in iter {
            tags.insert(tag);
        }
        tags
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamConfig {
    pub name: StreamName,
    /// Source URL; empty when the server did not report one.
    pub source: String,
    pub tags: Tags,
    /// Every other field of the config entry, passed through untouched.
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStat {
    pub client_count: u64,
    pub bps_out: u64,
    pub uptime_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushRecord {
    pub id: PushId,
    pub stream: StreamName,
    pub target: String,
    pub bytes: u64,
    pub uptime_secs: u64,
    /// Human readable rendering of `bytes`, derived locally.
    pub bytes_display: String,
    /// Human readable rendering of `uptime_secs`, derived locally.
    pub uptime_display: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSession {
    pub id: SessionId,
    pub host: String,
    pub protocol: String,
    /// Owning stream; `None` when the server omitted it.
    pub stream: Option<StreamName>,
    /// Connect time as reported by the server (unix seconds).
    pub connected_at: i64,
    pub bytes_down: u64,
    pub bytes_up: u64,
}

/// Connected sessions plus a derived per-stream index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientsFacet {
    pub sessions: BTreeMap<SessionId, ClientSession>,
    /// Sessions grouped by owning stream. Sessions without a stream are only
    /// present in `sessions`.
    pub by_stream: BTreeMap<StreamName, Vec<SessionId>>,
}

impl ClientsFacet {
    pub fn from_sessions(sessions: BTreeMap<SessionId, ClientSession>) -> Self {
        let mut by_stream: BTreeMap<StreamName, Vec<SessionId>> = BTreeMap::new();
        for session in sessions.values() {
            if let Some(stream) = &session.stream {
                by_stream
                    .entry(stream.clone())
                    .or_default()
                    .push(session.id.clone());
            }
        }
        Self {
            sessions,
            by_stream,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, id: &SessionId) -> Option<&ClientSession> {
        self.sessions.get(id)
    }

    /// Sessions watching `stream`, in session id order.
    pub fn for_stream<'a>(
        &'a self,
        stream: &StreamName,
    ) -> impl Iterator<Item = &'a ClientSession> + 'a {
        self.by_stream
            .get(stream)
            .into_iter()
            .flatten()
            .filter_map(|id| self.sessions.get(id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProtocolState {
    pub connector: String,
    /// The reported port is greater than zero.
    pub enabled: bool,
    /// Reported port, clamped to `u16::MAX`.
    pub port: u16,
    /// Bind interface; empty means all interfaces.
    pub interface: String,
}

/// Liveness of a stream as derived from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// Configured (or at least reported) and currently active.
    Live,
    /// Configured but not active.
    Offline,
    /// Not known to the snapshot at all.
    Unknown,
}

/// One complete capture of all tracked facets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub configured_streams: BTreeMap<StreamName, StreamConfig>,
    pub active_stream_names: BTreeSet<StreamName>,
    pub stream_stats: BTreeMap<StreamName, StreamStat>,
    pub pushes: BTreeMap<PushId, PushRecord>,
    pub clients: ClientsFacet,
    pub protocols: BTreeMap<String, ProtocolState>,
}

/// Counts rendered by a status line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub configured_streams: usize,
    pub active_streams: usize,
    pub viewers: u64,
    pub pushes: usize,
    pub sessions: usize,
    pub enabled_protocols: usize,
}

impl fmt::Display for SnapshotSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} streams live, {} viewers, {} pushes, {} sessions, {} protocols enabled",
            self.active_streams,
            self.configured_streams,
            self.viewers,
            self.pushes,
            self.sessions,
            self.enabled_protocols
        )
    }
}

impl Snapshot {
    /// Builds a snapshot from an aggregate sync response. Never fails: every
    /// facet degrades to its empty value when absent or malformed.
    pub fn from_response(response: &ApiResponse) -> Self {
        Self {
            configured_streams: normalize::normalize_streams(response.get("streams")),
            active_stream_names: normalize::normalize_active_streams(
                response.get("active_streams"),
            ),
            stream_stats: normalize::normalize_stream_stats(response.get("stats_streams")),
            pushes: normalize::normalize_pushes(response.get("push_list")),
            clients: normalize::normalize_clients(response.get("clients")),
            protocols: normalize::normalize_protocols(response.get("config")),
        }
    }

    pub fn is_active(&self, name: &StreamName) -> bool {
        self.active_stream_names.contains(name)
    }

    pub fn stream_status(&self, name: &StreamName) -> StreamStatus {
        if self.is_active(name) {
            StreamStatus::Live
        } else if self.configured_streams.contains_key(name) {
            StreamStatus::Offline
        } else {
            StreamStatus::Unknown
        }
    }

    pub fn stat(&self, name: &StreamName) -> StreamStat {
        self.stream_stats.get(name).copied().unwrap_or_default()
    }

    /// Ids of every push currently sending `stream`.
    pub fn pushes_for_stream(&self, stream: &StreamName) -> Vec<PushId> {
        self.pushes
            .values()
            .filter(|push| &push.stream == stream)
            .map(|push| push.id)
            .collect()
    }

    /// Sum of per-stream client counts, saturating at `u64::MAX`.
    pub fn total_viewers(&self) -> u64 {
        self.stream_stats
            .values()
            .fold(0u64, |total, s| total.saturating_add(s.client_count))
    }

    pub fn enabled_protocols(&self) -> impl Iterator<Item = &ProtocolState> {
        self.protocols.values().filter(|p| p.enabled)
    }

    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            configured_streams: self.configured_streams.len(),
            active_streams: self.active_stream_names.len(),
            viewers: self.total_viewers(),
            pushes: self.pushes.len(),
            sessions: self.clients.len(),
            enabled_protocols: self.enabled_protocols().count(),
        }
    }
}

/// Renders a byte count with binary units, e.g. `1.5 MiB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Renders a duration in seconds as `HH:MM:SS`, prefixed with days when
/// longer than a day.
pub fn format_duration(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;
    if days > 0 {
        format!("{days}d {hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}
