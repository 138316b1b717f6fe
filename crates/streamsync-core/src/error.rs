// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy shared by the request executor, the retry coordinator and
//! the configuration layer.

use std::error::Error as StdError;
use std::io;

/// Transport-level reason behind a [`RequestError::Network`] failure.
///
/// Only [`TransportFailure::ConnectionFailed`] is eligible for retries: it is
/// what a stopped or not-yet-listening server produces.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportFailure {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("request timed out")]
    Timeout,

    #[error("dns resolution failed: {0}")]
    Dns(String),

    #[error("tls failure: {0}")]
    Tls(String),

    #[error("{0}")]
    Other(String),
}

impl TransportFailure {
    /// Classifies a `reqwest` transport error.
    ///
    /// `ConnectionFailed` is only returned when a refused, reset, aborted or
    /// not-connected socket error is present in the source chain. Any other
    /// connect-phase failure is `Other` and therefore never retried.
    pub fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return TransportFailure::Timeout;
        }

        let mut source: Option<&(dyn StdError + 'static)> = err.source();
        while let Some(cause) = source {
            if let Some(io_err) = cause.downcast_ref::<io::Error>() {
                if let Some(failure) = classify_io(io_err) {
                    return failure;
                }
            }
            if cause.is::<rustls::Error>() {
                return TransportFailure::Tls(cause.to_string());
            }
            let message = cause.to_string().to_ascii_lowercase();
            if message.contains("dns error") || message.contains("failed to lookup address") {
                return TransportFailure::Dns(cause.to_string());
            }
            if message.contains("certificate") || message.contains("tls") {
                return TransportFailure::Tls(cause.to_string());
            }
            source = cause.source();
        }

        TransportFailure::Other(err.to_string())
    }
}

/// Inspects an io error and, since `io::Error::source` skips the payload it
/// wraps, the nested errors reachable through `get_ref`.
fn classify_io(io_err: &io::Error) -> Option<TransportFailure> {
    match io_err.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected => {
            return Some(TransportFailure::ConnectionFailed(io_err.to_string()))
        }
        io::ErrorKind::TimedOut => return Some(TransportFailure::Timeout),
        // rustls reports handshake and record failures as `InvalidData`.
        io::ErrorKind::InvalidData => return Some(TransportFailure::Tls(io_err.to_string())),
        _ => {}
    }
    let inner = io_err.get_ref()?;
    if inner.is::<rustls::Error>() {
        return Some(TransportFailure::Tls(io_err.to_string()));
    }
    inner.downcast_ref::<io::Error>().and_then(classify_io)
}

/// Outcome classes of a single control API request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("network error: {0}")]
    Network(TransportFailure),

    #[error("unexpected HTTP status {0}")]
    Http(u16),

    #[error("empty response body")]
    NoData,

    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl RequestError {
    /// Returns `true` when the failure is a connection-establishment failure,
    /// the only class the sync path retries.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RequestError::Network(TransportFailure::ConnectionFailed(_))
        )
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        RequestError::Network(TransportFailure::classify(&err))
    }
}

/// Errors raised while loading or validating [`crate::config::SyncConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
