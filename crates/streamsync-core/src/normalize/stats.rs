// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde_json::Value;

use super::{u64_field, unwrap_data_wrapper};
use crate::snapshot::{StreamName, StreamStat};

/// Normalizes the `stats_streams` facet. Accepts the bare `name -> stats`
/// map or the same map wrapped in `{"data": ...}`.
pub fn normalize_stream_stats(raw: Option<&Value>) -> BTreeMap<StreamName, StreamStat> {
    let Some(payload) = unwrap_data_wrapper(raw) else {
        return BTreeMap::new();
    };
    let Value::Object(entries) = payload.data else {
        return BTreeMap::new();
    };

    entries
        .iter()
        .map(|(name, entry)| {
            let stat = match entry {
                Value::Object(fields) => StreamStat {
                    client_count: u64_field(fields, "clients"),
                    bps_out: u64_field(fields, "bps_out"),
                    uptime_secs: u64_field(fields, "uptime"),
                },
                _ => StreamStat::default(),
            };
            (StreamName::new(name.as_str()), stat)
        })
        .collect()
}
