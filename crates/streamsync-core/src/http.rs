// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! One-shot command execution against the server's control endpoint.
//!
//! Every command is a JSON object POSTed to a single URL; the response is a
//! JSON object keyed by command name. This layer never retries, so mutating
//! commands fail fast; retry policy lives in [`crate::retry`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::SyncConfig;
use crate::error::{ConfigError, RequestError};

/// Decoded response object returned by the control endpoint.
pub type ApiResponse = Map<String, Value>;

/// Timeout class of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTimeout {
    /// Read-only queries and ordinary commands.
    Query,
    /// Commands known to be slow, such as software updates.
    Long,
}

/// Executes a single command and classifies its outcome.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Sends `command` exactly once. `command` must be a JSON object.
    async fn execute(
        &self,
        command: &Value,
        timeout: RequestTimeout,
    ) -> Result<ApiResponse, RequestError>;
}

/// [`CommandExecutor`] backed by a reusable `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: Client,
    api_url: String,
    query_timeout: Duration,
    long_timeout: Duration,
}

impl HttpExecutor {
    pub fn new(config: &SyncConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            query_timeout: config.query_timeout,
            long_timeout: config.update_timeout,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn timeout_for(&self, timeout: RequestTimeout) -> Duration {
        match timeout {
            RequestTimeout::Query => self.query_timeout,
            RequestTimeout::Long => self.long_timeout,
        }
    }

    /// Serializes an arbitrary command and executes it. Serialization
    /// failures surface as [`RequestError::MalformedRequest`] without any
    /// network attempt.
    pub async fn execute_value<T>(
        &self,
        command: &T,
        timeout: RequestTimeout,
    ) -> Result<ApiResponse, RequestError>
    where
        T: Serialize + ?Sized + Sync,
    {
        let value = serde_json::to_value(command)
            .map_err(|e| RequestError::MalformedRequest(e.to_string()))?;
        self.execute(&value, timeout).await
    }
}

#[async_trait]
impl CommandExecutor for HttpExecutor {
    async fn execute(
        &self,
        command: &Value,
        timeout: RequestTimeout,
    ) -> Result<ApiResponse, RequestError> {
        if !command.is_object() {
            return Err(RequestError::MalformedRequest(format!(
                "command must be a JSON object, got {}",
                value_kind(command)
            )));
        }
        let body = serde_json::to_vec(command)
            .map_err(|e| RequestError::MalformedRequest(e.to_string()))?;
        let timeout = self.timeout_for(timeout);

        debug!(
            url = %self.api_url,
            body_len = body.len(),
            timeout_ms = timeout.as_millis() as u64,
            body = %body_preview(&body),
            "control API request"
        );

        let response = self
            .client
            .post(&self.api_url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .timeout(timeout)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!(url = %self.api_url, status = %status, "control API rejected request");
            return Err(RequestError::Http(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        debug!(
            url = %self.api_url,
            status = %status,
            body_len = bytes.len(),
            "control API response"
        );
        decode_response(&bytes)
    }
}

/// Decodes a response body into a JSON object.
pub(crate) fn decode_response(bytes: &[u8]) -> Result<ApiResponse, RequestError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(RequestError::NoData);
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(RequestError::Parse(format!(
            "expected a JSON object, got {}",
            value_kind(&other)
        ))),
        Err(e) => Err(RequestError::Parse(e.to_string())),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Renders at most `PREVIEW_CHARS` characters of a request body for logs.
fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHARS: usize = 1024;
    let text = String::from_utf8_lossy(body);
    let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().nth(PREVIEW_CHARS).is_some() {
        preview.push('…');
    }
    preview
}
