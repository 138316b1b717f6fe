// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde_json::Value;

use super::{lenient_u64, string_field};
use crate::snapshot::ProtocolState;

/// Normalizes the protocol list found at `config.protocols`.
///
/// `raw` is the `config` object. A connector is enabled when its reported
/// port is greater than zero; a missing port counts as disabled. Ports above
/// `u16::MAX` keep the connector enabled and are clamped to `u16::MAX`.
/// When a connector appears several times, an enabled entry takes precedence
/// over a disabled one, otherwise the first entry wins.
pub fn normalize_protocols(raw: Option<&Value>) -> BTreeMap<String, ProtocolState> {
    let Some(Value::Array(entries)) = raw.and_then(|config| config.get("protocols")) else {
        return BTreeMap::new();
    };

    let mut protocols: BTreeMap<String, ProtocolState> = BTreeMap::new();
    for entry in entries {
        let Some(fields) = entry.as_object() else {
            continue;
        };
        let Some(connector) = string_field(fields, "connector").filter(|c| !c.is_empty()) else {
            continue;
        };
        let raw_port = fields.get("port").and_then(lenient_u64).unwrap_or(0);
        let state = ProtocolState {
            connector: connector.clone(),
            enabled: raw_port > 0,
            port: u16::try_from(raw_port).unwrap_or(u16::MAX),
            interface: string_field(fields, "interface").unwrap_or_default(),
        };

        let keep_existing = protocols
            .get(&connector)
            .is_some_and(|existing| existing.enabled || !state.enabled);
        if !keep_existing {
            protocols.insert(connector, state);
        }
    }
    protocols
}
