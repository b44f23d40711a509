//! Engine config (spec.md §3.2) and abort state (§3.3).
//!
//! `EngineConfig` is built by the YT engine during discovery and
//! mutated thereafter; it is a plain value passed by `&mut` reference
//! through the polling loop (Design Notes §9 "global mutable state",
//! no process-wide singleton).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub api_version: Option<String>,
    pub api_key: Option<String>,
    pub context: Option<serde_json::Value>,
    pub title: Option<String>,
    pub is_live: bool,
    pub is_upcoming: bool,
    pub is_unlisted: bool,
    pub playability_status: Option<String>,
    pub scheduled_start_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub heartbeat_params: Option<serde_json::Value>,
    pub heartbeat_interval_secs: f64,
    pub heartbeat_sequence_number: u64,
    pub logged_out: bool,
    pub no_chat_error: Option<String>,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            heartbeat_interval_secs: 60.0,
            ..Default::default()
        }
    }
}

/// One entry of the abort-state changelog (spec.md §3.3: "Every
/// mutation is recorded as a triple `(key, old, new)`").
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    Added { key: String, new: serde_json::Value },
    Changed {
        key: String,
        old: serde_json::Value,
        new: serde_json::Value,
    },
    Deleted { key: String, old: serde_json::Value },
}

/// Abort state (spec.md §3.3): a mapping whose every mutation is
/// logged before the checker evaluates conditions against it.
#[derive(Debug, Clone, Default)]
pub struct AbortState {
    map: BTreeMap<String, serde_json::Value>,
}

impl AbortState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.map.get(key)
    }

    /// Sets `key` to `value`, returning the changelog entry describing
    /// the mutation (or `None` if the value did not actually change).
    pub fn set(&mut self, key: &str, value: serde_json::Value) -> Option<StateChange> {
        match self.map.get(key) {
            None => {
                self.map.insert(key.to_string(), value.clone());
                Some(StateChange::Added {
                    key: key.to_string(),
                    new: value,
                })
            }
            Some(old) if old != &value => {
                let old = old.clone();
                self.map.insert(key.to_string(), value.clone());
                Some(StateChange::Changed {
                    key: key.to_string(),
                    old,
                    new: value,
                })
            }
            Some(_) => None,
        }
    }

    /// Logs a changelog entry at `debug` level, per §4.4: "Any change
    /// to the state map is emitted to the log with added/changed/
    /// deleted classification" before conditions are evaluated.
    pub fn log_change(change: &StateChange) {
        match change {
            StateChange::Added { key, new } => {
                tracing::debug!(key = %key, new = %new, "abort state added");
            }
            StateChange::Changed { key, old, new } => {
                tracing::debug!(key = %key, old = %old, new = %new, "abort state changed");
            }
            StateChange::Deleted { key, old } => {
                tracing::debug!(key = %key, old = %old, "abort state deleted");
            }
        }
    }
}
