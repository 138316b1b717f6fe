// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Facet normalizers.
//!
//! Each normalizer maps an arbitrary, possibly absent JSON fragment to its
//! canonical facet. None of them can fail: absence, `null`, a wrong type or an
//! unexpected shape all degrade to the facet's empty value.

mod clients;
mod pushes;
mod protocols;
mod stats;
mod streams;

pub use clients::normalize_clients;
pub use protocols::normalize_protocols;
pub use pushes::normalize_pushes;
pub use stats::normalize_stream_stats;
pub use streams::{normalize_active_streams, normalize_streams};

use serde_json::{Map, Value};

/// Payload extracted from a facet that may be wrapped as
/// `{"data": ..., "fields": [...], ...}`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Payload<'a> {
    pub data: &'a Value,
    /// Column names accompanying row-shaped `data`, when present.
    pub fields: Option<&'a [Value]>,
}

/// Resolves the `{data: ...}` wrapper shared by the stats and clients facets.
///
/// - absent, `null` or `{"data": null}` yield `None`;
/// - `{"data": x, ...}` yields `x` (plus the sibling `fields` array);
/// - anything else, including a bare map without `data`, is returned as is.
pub fn unwrap_data_wrapper(raw: Option<&Value>) -> Option<Payload<'_>> {
    let raw = raw?;
    match raw {
        Value::Null => None,
        Value::Object(map) => match map.get("data") {
            Some(Value::Null) => None,
            Some(data) => Some(Payload {
                data,
                fields: map
                    .get("fields")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice),
            }),
            None => Some(Payload {
                data: raw,
                fields: None,
            }),
        },
        other => Some(Payload {
            data: other,
            fields: None,
        }),
    }
}

/// Reads a non-negative integer from numbers, floats or numeric strings.
pub(crate) fn lenient_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f as u64)
            })
        }
        _ => None,
    }
}

/// Reads a signed integer from numbers, floats or numeric strings.
pub(crate) fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Reads a string, rendering numbers as text.
pub(crate) fn lenient_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn u64_field(obj: &Map<String, Value>, key: &str) -> u64 {
    obj.get(key).and_then(lenient_u64).unwrap_or(0)
}

pub(crate) fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(lenient_string)
}
