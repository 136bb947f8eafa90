//! Core events emitted by the engine

use curfew_api::{DisplayIntent, ObservedState, Severity};

/// Events emitted by the core engine.
///
/// The engine never performs side effects itself; the daemon turns these
/// into overlay updates, process kills and log lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// Overlay content change
    Display(DisplayIntent),

    /// Forcefully close every process running this executable
    TerminateApp { executable: String },

    /// Power the machine off now
    Shutdown,

    /// Human-readable log line for the dashboard feed
    Notice { message: String, severity: Severity },

    /// The observed state changed
    StateChanged(ObservedState),
}

impl CoreEvent {
    pub fn notice(message: impl Into<String>, severity: Severity) -> Self {
        Self::Notice {
            message: message.into(),
            severity,
        }
    }
}
