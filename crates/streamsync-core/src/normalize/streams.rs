// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use super::string_field;
use crate::snapshot::{StreamConfig, StreamName, Tags};

const RESERVED_KEYS: [&str; 3] = ["name", "source", "tags"];

/// Normalizes the `streams` facet (`name -> config`).
pub fn normalize_streams(raw: Option<&Value>) -> BTreeMap<StreamName, StreamConfig> {
    let Some(Value::Object(entries)) = raw else {
        return BTreeMap::new();
    };

    entries
        .iter()
        .map(|(name, entry)| {
            let name = StreamName::new(name.as_str());
            let config = match entry {
                Value::Object(fields) => stream_config(name.clone(), fields),
                _ => StreamConfig {
                    name: name.clone(),
                    source: String::new(),
                    tags: Tags::default(),
                    extra: Map::new(),
                },
            };
            (name, config)
        })
        .collect()
}

fn stream_config(name: StreamName, fields: &Map<String, Value>) -> StreamConfig {
    let tags = match fields.get("tags") {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(single)) => std::iter::once(single.as_str()).collect(),
        _ => Tags::default(),
    };
    let extra = fields
        .iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    StreamConfig {
        name,
        source: string_field(fields, "source").unwrap_or_default(),
        tags,
        extra,
    }
}

/// Normalizes the `active_streams` facet: a list of names, or an object whose
/// keys are names.
pub fn normalize_active_streams(raw: Option<&Value>) -> BTreeSet<StreamName> {
    match raw {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(StreamName::from)
            .collect(),
        Some(Value::Object(map)) => map.keys().map(|k| StreamName::from(k.as_str())).collect(),
        _ => BTreeSet::new(),
    }
}
