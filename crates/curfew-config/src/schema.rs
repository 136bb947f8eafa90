//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};

/// Raw configuration as parsed from TOML
///
/// Every section is optional; a missing section disables the feature it
/// configures.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Skip all warnings and close blocked apps immediately
    #[serde(default)]
    pub strict_mode: bool,

    /// Log destructive actions (force-close, shutdown) instead of performing them
    #[serde(default)]
    pub dry_run: bool,

    /// Daily focus window and escalation settings
    pub active_window: Option<RawActiveWindow>,

    /// Independent daily shutdown
    pub scheduled_shutdown: Option<RawScheduledShutdown>,

    /// Title substrings that block the foreground window, checked in order
    #[serde(default)]
    pub block_keywords: Vec<String>,

    /// Title substrings that allow the foreground window
    #[serde(default)]
    pub allow_keywords: Vec<String>,

    #[serde(default)]
    pub blocklist: Option<RawMatchList>,

    #[serde(default)]
    pub whitelist: Option<RawMatchList>,
}

/// Active window settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawActiveWindow {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Start time (HH:MM format)
    #[serde(default = "default_start_time")]
    pub start_time: String,

    /// End time (HH:MM format). May be earlier than start_time to cross midnight.
    #[serde(default = "default_end_time")]
    pub end_time: String,

    /// How often to check the foreground window
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,

    /// Minimum time between two warnings for the same app
    #[serde(default = "default_warning_interval")]
    pub warning_interval_seconds: u64,

    /// Warnings before the final countdown starts
    #[serde(default = "default_max_warnings")]
    pub max_warnings: u32,

    /// Shut the machine down when end_time is reached
    #[serde(default)]
    pub shutdown_at_end: bool,
}

impl Default for RawActiveWindow {
    fn default() -> Self {
        Self {
            enabled: true,
            start_time: default_start_time(),
            end_time: default_end_time(),
            check_interval_seconds: default_check_interval(),
            warning_interval_seconds: default_warning_interval(),
            max_warnings: default_max_warnings(),
            shutdown_at_end: false,
        }
    }
}

/// Daily shutdown settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawScheduledShutdown {
    #[serde(default)]
    pub enabled: bool,

    /// Shutdown time (HH:MM format)
    #[serde(default = "default_shutdown_time")]
    pub time: String,
}

/// Process and domain substrings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawMatchList {
    /// Matched against the executable name
    #[serde(default)]
    pub processes: Vec<String>,

    /// Matched against the window title
    #[serde(default)]
    pub domains: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_start_time() -> String {
    "09:00".to_string()
}

fn default_end_time() -> String {
    "23:59".to_string()
}

fn default_shutdown_time() -> String {
    "23:00".to_string()
}

fn default_check_interval() -> u64 {
    7
}

fn default_warning_interval() -> u64 {
    10
}

fn default_max_warnings() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
            config_version = 1
            strict_mode = true
            block_keywords = ["youtube", "game"]
            allow_keywords = ["tutorial"]

            [active_window]
            start_time = "22:00"
            end_time = "06:00"
            max_warnings = 5

            [scheduled_shutdown]
            enabled = true
            time = "23:30"

            [blocklist]
            processes = ["steam"]
            domains = ["reddit.com"]
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert!(config.strict_mode);
        assert!(!config.dry_run);
        assert_eq!(config.block_keywords, vec!["youtube", "game"]);

        let window = config.active_window.unwrap();
        assert!(window.enabled);
        assert_eq!(window.start_time, "22:00");
        assert_eq!(window.max_warnings, 5);
        assert_eq!(window.check_interval_seconds, 7);

        assert_eq!(config.scheduled_shutdown.unwrap().time, "23:30");
        assert!(config.whitelist.is_none());
        assert_eq!(config.blocklist.unwrap().processes, vec!["steam"]);
    }

    #[test]
    fn parse_sections_optional() {
        let config: RawConfig = toml::from_str("config_version = 1").unwrap();
        assert!(config.active_window.is_none());
        assert!(config.scheduled_shutdown.is_none());
        assert!(config.block_keywords.is_empty());
    }

    #[test]
    fn empty_active_window_uses_defaults() {
        let config: RawConfig = toml::from_str("config_version = 1\n[active_window]\n").unwrap();
        let window = config.active_window.unwrap();
        let defaults = RawActiveWindow::default();
        assert_eq!(window.start_time, defaults.start_time);
        assert_eq!(window.end_time, "23:59");
        assert_eq!(window.warning_interval_seconds, 10);
        assert_eq!(window.max_warnings, 3);
    }
}
