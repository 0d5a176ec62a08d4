//! Load Event Logger
//!
//! Structured load-lifecycle events, emitted through `tracing` on the
//! `load_events` target so they land in the NDJSON file layer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::redact::redact_sensitive_data;

/// Why a load request was refused without running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Destroyed,
    Inactive,
    Guard,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoadEvent {
    Started { seq: u64, notify_loading: bool },
    Finished { seq: u64 },
    Cancelled { seq: u64 },
    Rejected { reason: RejectReason },
    Failed { page: Option<i32>, error: String },
}

#[derive(Debug, Serialize)]
pub struct LoadEventEntry {
    pub plugin: String,
    pub timestamp: DateTime<Utc>,
    pub event: LoadEvent,
}

impl LoadEventEntry {
    pub fn new(plugin: &str, mut event: LoadEvent) -> Self {
        if let LoadEvent::Failed { error, .. } = &mut event {
            *error = redact_sensitive_data(error);
        }
        Self {
            plugin: plugin.to_string(),
            timestamp: Utc::now(),
            event,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

pub struct EventLogger;

impl EventLogger {
    /// Log a load event for `plugin`. Failures are warnings, the rest is debug
    /// chatter.
    pub fn log(plugin: &str, event: LoadEvent) {
        let entry = LoadEventEntry::new(plugin, event);
        match &entry.event {
            LoadEvent::Failed { .. } => {
                warn!(target: "load_events", plugin = %entry.plugin, event = %entry.to_json(), "Load failed");
            }
            _ => {
                debug!(target: "load_events", plugin = %entry.plugin, event = %entry.to_json(), "Load event");
            }
        }
    }
}
