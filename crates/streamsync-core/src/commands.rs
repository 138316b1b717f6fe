// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mutating commands sent on behalf of user actions.
//!
//! These go through [`CommandExecutor`] exactly once: a failed `push_start`
//! or `deletestream` is reported to the caller instead of being retried.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::error::RequestError;
use crate::http::{ApiResponse, CommandExecutor, RequestTimeout};
use crate::snapshot::{PushId, SessionId, StreamName};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddStream { name: StreamName, source: String },
    DeleteStream(StreamName),
    /// Kills every process tied to a stream.
    NukeStream(StreamName),
    PushStart { stream: StreamName, target: String },
    PushStop(PushId),
    PushAutoAdd { stream: StreamName, target: String },
    PushAutoRemove { stream: StreamName, target: String },
    AddTag { stream: StreamName, tag: String },
    DelTag { stream: StreamName, tag: String },
    StopSession(SessionId),
    Kick(SessionId),
    /// Asks the server to re-run authorization for a session.
    Reauth(SessionId),
    TagSession { session: SessionId, tag: String },
    StopTag(String),
    /// Merges the given keys into the server configuration.
    SetConfig(Map<String, Value>),
    /// Replaces the server configuration with a previously saved one.
    RestoreConfig(Value),
    Save,
    CheckUpdate,
    Update,
}

impl Command {
    /// Top-level key under which the command travels.
    pub fn name(&self) -> &'static str {
        match self {
            Command::AddStream { .. } => "addstream",
            Command::DeleteStream(_) => "deletestream",
            Command::NukeStream(_) => "nuke_stream",
            Command::PushStart { .. } => "push_start",
            Command::PushStop(_) => "push_stop",
            Command::PushAutoAdd { .. } => "push_auto_add",
            Command::PushAutoRemove { .. } => "push_auto_remove",
            Command::AddTag { .. } => "addtag",
            Command::DelTag { .. } => "deltag",
            Command::StopSession(_) => "stop_sessID",
            Command::Kick(_) => "kick",
            Command::Reauth(_) => "reauth",
            Command::TagSession { .. } => "tag_sessID",
            Command::StopTag(_) => "stop_tag",
            Command::SetConfig(_) => "config",
            Command::RestoreConfig(_) => "config_restore",
            Command::Save => "save",
            Command::CheckUpdate => "checkupdate",
            Command::Update => "update",
        }
    }

    pub fn timeout(&self) -> RequestTimeout {
        match self {
            Command::Update => RequestTimeout::Long,
            _ => RequestTimeout::Query,
        }
    }

    /// Request body: `{ <name>: <parameters> }`.
    pub fn to_value(&self) -> Value {
        let params = match self {
            Command::AddStream { name, source } => json!({ name.as_str(): { "source": source } }),
            Command::DeleteStream(name) => json!([name.as_str()]),
            Command::NukeStream(name) => json!(name.as_str()),
            Command::PushStart { stream, target }
            | Command::PushAutoAdd { stream, target }
            | Command::PushAutoRemove { stream, target } => {
                json!({ "stream": stream.as_str(), "target": target })
            }
            Command::PushStop(id) => json!([id.get()]),
            Command::AddTag { stream, tag } | Command::DelTag { stream, tag } => {
                json!({ stream.as_str(): tag })
            }
            Command::StopSession(id) | Command::Kick(id) | Command::Reauth(id) => {
                json!(id.as_str())
            }
            Command::TagSession { session, tag } => json!({ session.as_str(): tag }),
            Command::StopTag(tag) => json!(tag),
            Command::SetConfig(values) => Value::Object(values.clone()),
            Command::RestoreConfig(saved) => saved.clone(),
            Command::Save | Command::CheckUpdate | Command::Update => Value::Bool(true),
        };
        let mut body = Map::with_capacity(1);
        body.insert(self.name().to_string(), params);
        Value::Object(body)
    }
}

/// Sends [`Command`]s without retrying.
#[derive(Clone)]
pub struct ControlClient {
    executor: Arc<dyn CommandExecutor>,
}

impl std::fmt::Debug for ControlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlClient").finish_non_exhaustive()
    }
}

impl ControlClient {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    pub async fn send(&self, command: &Command) -> Result<ApiResponse, RequestError> {
        let result = self
            .executor
            .execute(&command.to_value(), command.timeout())
            .await;
        match &result {
            Ok(_) => info!(command = command.name(), "control command accepted"),
            Err(err) => warn!(command = command.name(), %err, "control command failed"),
        }
        result
    }
}
