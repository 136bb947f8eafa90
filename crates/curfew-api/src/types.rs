//! Shared types for the curfew API

use chrono::{DateTime, Local};
use curfew_util::WallClock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Snapshot of the application holding input focus, taken once per poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForegroundWindow {
    /// Process name as reported by the host (e.g. `/proc/<pid>/comm`)
    pub process_name: String,
    /// Full path of the executable, when the host can resolve it
    #[serde(default)]
    pub executable_path: Option<PathBuf>,
    pub window_title: String,
    #[serde(default)]
    pub pid: Option<u32>,
}

impl ForegroundWindow {
    pub fn new(process_name: impl Into<String>, window_title: impl Into<String>) -> Self {
        Self {
            process_name: process_name.into(),
            executable_path: None,
            window_title: window_title.into(),
            pid: None,
        }
    }

    pub fn with_executable_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Lowercase executable basename. Warning history is keyed by this.
    pub fn app_key(&self) -> String {
        self.executable_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.process_name.clone())
            .trim()
            .to_lowercase()
    }

    pub fn normalized_title(&self) -> String {
        self.window_title.to_lowercase()
    }
}

/// Presentation mode of the overlay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Full blocking overlay that takes focus
    #[default]
    Blocking,
    /// Countdown timer only, without stealing focus from the user's work
    TimerOnly,
}

/// Extra presentation hints carried by an update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayExtra {
    pub mode: DisplayMode,
    /// Seconds left on the countdown being displayed
    #[serde(default)]
    pub timer_seconds: Option<u64>,
    /// Show the overlay even if it is currently hidden
    #[serde(default)]
    pub force_show: bool,
}

/// What the overlay surface should display.
///
/// The engine only decides content and timing; focus stealing and
/// click-through are up to the overlay client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DisplayIntent {
    Show {
        title: String,
        message: String,
        urgent: bool,
    },
    Update {
        title: String,
        message: String,
        #[serde(default)]
        extra: DisplayExtra,
    },
    Hide,
}

impl DisplayIntent {
    pub fn show(title: impl Into<String>, message: impl Into<String>, urgent: bool) -> Self {
        Self::Show {
            title: title.into(),
            message: message.into(),
            urgent,
        }
    }

    pub fn update(title: impl Into<String>, message: impl Into<String>, extra: DisplayExtra) -> Self {
        Self::Update {
            title: title.into(),
            message: message.into(),
            extra,
        }
    }
}

/// Severity of a human-readable log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Last state observed by the poll loop, used for edge-triggered logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservedState {
    OutsideWindow,
    Disabled,
    Whitelisted,
    Allowed,
    Blocked,
    Countdown,
    Neutral,
    Error,
}

impl fmt::Display for ObservedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObservedState::OutsideWindow => "outside-window",
            ObservedState::Disabled => "disabled",
            ObservedState::Whitelisted => "whitelisted",
            ObservedState::Allowed => "allowed",
            ObservedState::Blocked => "blocked",
            ObservedState::Countdown => "countdown",
            ObservedState::Neutral => "neutral",
            ObservedState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Which daily trigger started a shutdown sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownTrigger {
    /// The active window reached its end time with `shutdown_at_end` set
    EndOfWindow,
    /// The independent daily shutdown
    Daily,
}

impl ShutdownTrigger {
    /// Title shown on the shutdown overlay
    pub fn reason(&self) -> &'static str {
        match self {
            ShutdownTrigger::EndOfWindow => "Focus Session Ended",
            ShutdownTrigger::Daily => "Daily Scheduled Shutdown",
        }
    }
}

/// Per-app warning history as exposed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningRecordView {
    pub app: String,
    pub warning_count: u32,
    pub countdown_active: bool,
}

/// A running countdown as exposed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownView {
    pub target: String,
    pub remaining_seconds: u64,
}

/// An armed daily job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledJobView {
    pub trigger: ShutdownTrigger,
    pub at: WallClock,
    pub next_fire: DateTime<Local>,
}

/// Full engine state snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub api_version: u32,
    pub running: bool,
    pub observed_state: Option<ObservedState>,
    pub current_blocked_app: Option<String>,
    pub final_countdown: Option<CountdownView>,
    pub shutdown_countdown: Option<CountdownView>,
    #[serde(default)]
    pub warning_records: Vec<WarningRecordView>,
    #[serde(default)]
    pub scheduled_jobs: Vec<ScheduledJobView>,
}

/// Condensed view of the loaded policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySummary {
    pub monitoring_enabled: bool,
    pub active_window: Option<String>,
    pub check_interval_seconds: u64,
    pub warning_interval_seconds: u64,
    pub max_warnings: u32,
    pub shutdown_at_end: bool,
    pub scheduled_shutdown: Option<String>,
    pub strict_mode: bool,
    pub dry_run: bool,
    pub block_keyword_count: usize,
    pub allow_keyword_count: usize,
    pub blocklist_count: usize,
    pub whitelist_count: usize,
}

/// Role for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Overlay or dashboard of the monitored user: can view state and events
    Observer,
    /// Local admin (same UID as the daemon, or root): can also reload config
    Admin,
}

impl ClientRole {
    pub fn can_reload_config(&self) -> bool {
        matches!(self, ClientRole::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_key_prefers_executable_basename() {
        let window = ForegroundWindow::new("Steam", "Store")
            .with_executable_path("/opt/Steam/Steam.EXE");
        assert_eq!(window.app_key(), "steam.exe");
    }

    #[test]
    fn app_key_falls_back_to_process_name() {
        let window = ForegroundWindow::new("Firefox", "YouTube - Mozilla Firefox");
        assert_eq!(window.app_key(), "firefox");
        assert_eq!(window.normalized_title(), "youtube - mozilla firefox");
    }

    #[test]
    fn display_intent_serialization() {
        let intent = DisplayIntent::update(
            "FINAL WARNING",
            "Closing steam in 9s...",
            DisplayExtra {
                timer_seconds: Some(9),
                ..Default::default()
            },
        );

        let json = serde_json::to_string(&intent).unwrap();
        assert!(json.contains("\"action\":\"update\""));

        let parsed: DisplayIntent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, intent);

        let hide = serde_json::to_string(&DisplayIntent::Hide).unwrap();
        assert_eq!(hide, r#"{"action":"hide"}"#);
    }

    #[test]
    fn observed_state_display() {
        assert_eq!(ObservedState::OutsideWindow.to_string(), "outside-window");
        assert_eq!(ObservedState::Countdown.to_string(), "countdown");
    }

    #[test]
    fn role_permissions() {
        assert!(ClientRole::Admin.can_reload_config());
        assert!(!ClientRole::Observer.can_reload_config());
    }
}
