// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::{lenient_i64, lenient_string, string_field, u64_field, unwrap_data_wrapper};
use crate::snapshot::{ClientSession, ClientsFacet, SessionId, StreamName};

const SESSION_ID_KEY: &str = "sessId";

/// Normalizes the `clients` facet.
///
/// After unwrapping `{"data": ...}`, `data` may be a map `sessId -> record`,
/// a list of records carrying `sessId`, or a list of rows aligned with the
/// wrapper's `fields` array.
pub fn normalize_clients(raw: Option<&Value>) -> ClientsFacet {
    let Some(payload) = unwrap_data_wrapper(raw) else {
        return ClientsFacet::default();
    };

    let mut sessions = BTreeMap::new();
    match payload.data {
        Value::Object(entries) => {
            for (key, entry) in entries {
                let fields = entry.as_object();
                let session = from_fields(SessionId::new(key.as_str()), fields);
                sessions.insert(session.id.clone(), session);
            }
        }
        Value::Array(rows) => {
            for row in rows {
                let record = match (row, payload.fields) {
                    (Value::Object(fields), _) => Some(fields.clone()),
                    (Value::Array(cells), Some(names)) => Some(zip_row(names, cells)),
                    _ => None,
                };
                let Some(record) = record else { continue };
                let Some(id) = string_field(&record, SESSION_ID_KEY) else {
                    continue;
                };
                let session = from_fields(SessionId::new(id), Some(&record));
                sessions.insert(session.id.clone(), session);
            }
        }
        _ => {}
    }

    ClientsFacet::from_sessions(sessions)
}

fn zip_row(names: &[Value], cells: &[Value]) -> Map<String, Value> {
    names
        .iter()
        .zip(cells)
        .filter_map(|(name, cell)| Some((name.as_str()?.to_string(), cell.clone())))
        .collect()
}

fn from_fields(id: SessionId, fields: Option<&Map<String, Value>>) -> ClientSession {
    let empty = Map::new();
    let fields = fields.unwrap_or(&empty);
    ClientSession {
        id,
        host: string_field(fields, "host").unwrap_or_default(),
        protocol: string_field(fields, "protocol").unwrap_or_default(),
        stream: fields
            .get("stream")
            .and_then(lenient_string)
            .filter(|s| !s.is_empty())
            .map(StreamName::new),
        connected_at: fields.get("conntime").and_then(lenient_i64).unwrap_or(0),
        bytes_down: u64_field(fields, "down"),
        bytes_up: u64_field(fields, "up"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_malformed_fragments_yield_empty_facet() {
        for raw in [
            None,
            Some(json!(null)),
            Some(json!({"data": null})),
            Some(json!({"data": null, "fields": ["host"], "time": 1})),
            Some(json!({})),
            Some(json!(3)),
            Some(json!({"data": "x"})),
            Some(json!({"data": [[1, 2]]})),
        ] {
            let facet = normalize_clients(raw.as_ref());
            assert!(facet.is_empty(), "{raw:?}");
            assert!(facet.by_stream.is_empty());
        }
    }

    #[test]
    fn test_wrapped_map_and_bare_map_are_equivalent() {
        let inner = json!({
            "a1": {"host": "10.0.0.1", "stream": "live", "protocol": "HLS", "conntime": 1700000000},
            "b2": {"host": "10.0.0.2", "protocol": "RTMP"}
        });
        let wrapped = json!({"data": inner.clone(), "fields": ["host", "stream"]});

        let bare = normalize_clients(Some(&inner));
        let unwrapped = normalize_clients(Some(&wrapped));
        assert_eq!(bare, unwrapped);

        assert_eq!(bare.len(), 2);
        let a1 = bare.get(&SessionId::from("a1")).expect("a1");
        assert_eq!(a1.protocol, "HLS");
        assert_eq!(a1.connected_at, 1_700_000_000);
        assert_eq!(a1.stream, Some(StreamName::from("live")));
    }

    #[test]
    fn test_sessions_without_stream_stay_out_of_index() {
        let raw = json!({"data": {
            "a": {"stream": "live"},
            "b": {"host": "h"},
            "c": {"stream": ""},
            "d": {"stream": "live"}
        }});
        let facet = normalize_clients(Some(&raw));
        assert_eq!(facet.len(), 4);
        assert_eq!(facet.by_stream.len(), 1);
        assert_eq!(
            facet.by_stream[&StreamName::from("live")],
            vec![SessionId::from("a"), SessionId::from("d")]
        );
    }

    #[test]
    fn test_rows_zipped_with_fields() {
        let raw = json!({
            "fields": ["host", "stream", "protocol", "conntime", "sessId"],
            "data": [
                ["10.0.0.1", "live", "HLS", 100, "s1"],
                ["10.0.0.2", "cam", "WebRTC", 200, 42],
                ["10.0.0.3", "cam", "RTSP", 300]
            ],
            "time": 1700000000
        });
        let facet = normalize_clients(Some(&raw));
        assert_eq!(facet.len(), 2, "row without sessId is skipped");
        let s1 = facet.get(&SessionId::from("s1")).expect("s1");
        assert_eq!(s1.host, "10.0.0.1");
        assert_eq!(s1.connected_at, 100);
        assert!(facet.get(&SessionId::from("42")).is_some());
        assert_eq!(facet.for_stream(&StreamName::from("cam")).count(), 1);
    }

    #[test]
    fn test_list_of_records() {
        let raw = json!([{"sessId": "x", "stream": "live", "down": 10, "up": "5"}, {"host": "no-id"}]);
        let facet = normalize_clients(Some(&raw));
        assert_eq!(facet.len(), 1);
        let x = facet.get(&SessionId::from("x")).expect("x");
        assert_eq!(x.bytes_down, 10);
        assert_eq!(x.bytes_up, 5);
    }
}
