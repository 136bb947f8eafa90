//! Event types for curfewd -> client streaming

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::{DisplayIntent, EngineStatus, Severity, API_VERSION};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: curfew_util::now(),
            payload,
        }
    }
}

/// All possible events from the daemon to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Overlay content change for the presentation layer
    Display(DisplayIntent),

    /// Human-readable log line for the dashboard feed
    Log { message: String, severity: Severity },

    /// Full state snapshot (sent on observed-state transitions)
    StateChanged(EngineStatus),

    /// Policy was reloaded
    PolicyReloaded { success: bool },

    /// The shutdown countdown expired and the machine is powering off
    SystemShutdown,

    /// curfewd received SIGTERM/SIGINT and is stopping; the machine stays up
    ServiceStopping,
}
