// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::trace;

use super::{lenient_string, lenient_u64, string_field, u64_field};
use crate::snapshot::{format_bytes, format_duration, PushId, PushRecord, StreamName};

/// Normalizes the `push_list` facet.
///
/// Two shapes are understood: a map `id -> record`, and a list of rows
/// `[id, stream, target, resolved_target, logs, stats]`. Counters missing
/// from either shape default to 0; display strings are derived here.
pub fn normalize_pushes(raw: Option<&Value>) -> BTreeMap<PushId, PushRecord> {
    match raw {
        Some(Value::Object(entries)) => entries
            .iter()
            .filter_map(|(key, entry)| {
                let id = key
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .or_else(|| entry.get("id").and_then(lenient_u64));
                let Some(id) = id else {
                    trace!(key = %key, "skipping push entry without a numeric id");
                    return None;
                };
                let fields = entry.as_object();
                Some(from_fields(PushId::new(id), fields))
            })
            .map(|record| (record.id, record))
            .collect(),
        Some(Value::Array(rows)) => rows
            .iter()
            .filter_map(from_row)
            .map(|record| (record.id, record))
            .collect(),
        _ => BTreeMap::new(),
    }
}

fn from_fields(id: PushId, fields: Option<&Map<String, Value>>) -> PushRecord {
    let empty = Map::new();
    let fields = fields.unwrap_or(&empty);
    let stats = fields.get("stats").and_then(Value::as_object);

    let bytes = counter(fields, stats, &["bytes"]);
    let uptime = counter(fields, stats, &["active_seconds", "uptime"]);

    build(
        id,
        string_field(fields, "stream").unwrap_or_default(),
        string_field(fields, "target").unwrap_or_default(),
        bytes,
        uptime,
    )
}

fn from_row(row: &Value) -> Option<PushRecord> {
    let row = row.as_array()?;
    let id = row.first().and_then(lenient_u64)?;
    let stream = row.get(1).and_then(lenient_string).unwrap_or_default();
    let target = row.get(2).and_then(lenient_string).unwrap_or_default();
    let stats = row.get(5).and_then(Value::as_object);
    let empty = Map::new();
    let bytes = counter(&empty, stats, &["bytes"]);
    let uptime = counter(&empty, stats, &["active_seconds", "uptime"]);
    Some(build(PushId::new(id), stream, target, bytes, uptime))
}

/// Reads the first present counter among `keys`, looking at the record
/// itself before its nested `stats` object.
fn counter(fields: &Map<String, Value>, stats: Option<&Map<String, Value>>, keys: &[&str]) -> u64 {
    for key in keys {
        if fields.contains_key(*key) {
            return u64_field(fields, key);
        }
        if let Some(stats) = stats {
            if stats.contains_key(*key) {
                return u64_field(stats, key);
            }
        }
    }
    0
}

fn build(id: PushId, stream: String, target: String, bytes: u64, uptime_secs: u64) -> PushRecord {
    PushRecord {
        id,
        stream: StreamName::new(stream),
        target,
        bytes,
        uptime_secs,
        bytes_display: format_bytes(bytes),
        uptime_display: format_duration(uptime_secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_malformed_fragments_yield_empty_map() {
        for raw in [
            None,
            Some(json!(null)),
            Some(json!({})),
            Some(json!([])),
            Some(json!("push")),
            Some(json!({"not-a-number": {"stream": "live"}})),
        ] {
            assert!(normalize_pushes(raw.as_ref()).is_empty(), "{raw:?}");
        }
    }

    #[test]
    fn test_map_shape_defaults_missing_counters() {
        let raw = json!({
            "12": {"stream": "live", "target": "rtmp://a/live"},
            "13": {"stream": "live", "target": "rtmp://b/live", "bytes": 2048, "uptime": 3661}
        });
        let pushes = normalize_pushes(Some(&raw));
        assert_eq!(pushes.len(), 2);

        let bare = &pushes[&PushId::new(12)];
        assert_eq!(bare.bytes, 0);
        assert_eq!(bare.uptime_secs, 0);
        assert_eq!(bare.bytes_display, "0 B");
        assert_eq!(bare.uptime_display, "00:00:00");

        let full = &pushes[&PushId::new(13)];
        assert_eq!(full.stream, StreamName::from("live"));
        assert_eq!(full.bytes_display, "2.0 KiB");
        assert_eq!(full.uptime_display, "01:01:01");
    }

    #[test]
    fn test_map_shape_reads_nested_stats() {
        let raw = json!({"7": {"stream": "cam", "target": "srt://x", "stats": {"bytes": "1024", "active_seconds": 5}}});
        let pushes = normalize_pushes(Some(&raw));
        let push = &pushes[&PushId::new(7)];
        assert_eq!(push.bytes, 1024);
        assert_eq!(push.uptime_secs, 5);
    }

    #[test]
    fn test_row_shape() {
        let raw = json!([
            [4, "live", "rtmp://a/live", "rtmp://a/live", [], {"bytes": 10, "active_seconds": 2}],
            [5, "vod"],
            ["bad-id", "live", "x"],
            "garbage"
        ]);
        let pushes = normalize_pushes(Some(&raw));
        assert_eq!(pushes.len(), 2);
        assert_eq!(pushes[&PushId::new(4)].bytes, 10);
        assert_eq!(pushes[&PushId::new(4)].uptime_secs, 2);
        assert_eq!(pushes[&PushId::new(5)].target, "");
        assert_eq!(pushes[&PushId::new(5)].stream, StreamName::from("vod"));
    }
}
