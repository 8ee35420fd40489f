//! C10 — Reason map and status helpers.
//!
//! Derives a human-facing end reason from the raw per-port status bitmap
//! (spec.md §4.3/§4.9), and loads the optional vendor→reason label overrides
//! used when forwarding [`crate::event::CoreEvent::SessionEnded`] onward.

use crate::constants::status_bit;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Offline,
    NoLoad,
    OverTemperature,
    OverCurrent,
    Normal,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::Offline => "offline",
            EndReason::NoLoad => "no_load",
            EndReason::OverTemperature => "over_temperature",
            EndReason::OverCurrent => "over_current",
            EndReason::Normal => "normal",
        }
    }
}

/// Derive the end reason from a raw port-status byte, in priority order
/// (§4.3): offline beats every other condition; among online ports,
/// no-load beats temperature beats current; anything else is a normal end.
pub fn derive_end_reason(raw_status: u8) -> EndReason {
    if raw_status & status_bit::ONLINE == 0 {
        return EndReason::Offline;
    }
    if raw_status & status_bit::NO_LOAD != 0 {
        return EndReason::NoLoad;
    }
    if raw_status & status_bit::TEMPERATURE_OK == 0 {
        return EndReason::OverTemperature;
    }
    if raw_status & status_bit::CURRENT_OK == 0 {
        return EndReason::OverCurrent;
    }
    EndReason::Normal
}

/// Optional vendor-label overrides for end reasons, loaded from YAML
/// (§2.3). Falls back to [`EndReason::as_str`] for any code with no entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReasonMap {
    #[serde(default)]
    labels: HashMap<String, String>,
}

impl ReasonMap {
    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }

    pub fn label(&self, reason: EndReason) -> &str {
        self.labels
            .get(reason.as_str())
            .map(String::as_str)
            .unwrap_or_else(|| reason.as_str())
    }
}
