//! Validated policy structures

use crate::schema::{RawActiveWindow, RawConfig, RawMatchList, RawScheduledShutdown};
use crate::validation::{missing_sections, parse_time};
use curfew_api::PolicySummary;
use curfew_util::{CurfewError, TimeWindow, WallClock};
use std::time::Duration;

/// Poll cadence used when no active window is configured, so that
/// re-enabling monitoring by reload is picked up promptly.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(7);

/// Validated policy ready for use by the core engine.
///
/// Immutable once built; the daemon swaps whole snapshots on reload.
#[derive(Debug, Clone)]
pub struct Policy {
    /// None when the `[active_window]` section is absent (monitoring off)
    pub active_window: Option<ActiveWindowPolicy>,

    /// None when the `[scheduled_shutdown]` section is absent
    pub scheduled_shutdown: Option<ScheduledShutdownPolicy>,

    pub rules: RuleSet,

    pub strict_mode: bool,

    pub dry_run: bool,

    /// Sections absent from the source file
    pub missing_sections: Vec<CurfewError>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            active_window: None,
            scheduled_shutdown: None,
            rules: RuleSet::default(),
            strict_mode: false,
            dry_run: false,
            missing_sections: Vec::new(),
        }
    }
}

impl Policy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let missing_sections = missing_sections(&raw);

        Self {
            active_window: raw.active_window.map(ActiveWindowPolicy::from_raw),
            scheduled_shutdown: raw.scheduled_shutdown.map(ScheduledShutdownPolicy::from_raw),
            rules: RuleSet {
                block_keywords: normalize_list(raw.block_keywords),
                allow_keywords: normalize_list(raw.allow_keywords),
                blocklist: raw.blocklist.map(MatchList::from_raw).unwrap_or_default(),
                whitelist: raw.whitelist.map(MatchList::from_raw).unwrap_or_default(),
            },
            strict_mode: raw.strict_mode,
            dry_run: raw.dry_run,
            missing_sections,
        }
    }

    /// Foreground polling is active only with an enabled `[active_window]`
    pub fn monitoring_enabled(&self) -> bool {
        self.active_window.as_ref().is_some_and(|w| w.enabled)
    }

    pub fn check_interval(&self) -> Duration {
        self.active_window
            .as_ref()
            .map(|w| w.check_interval)
            .unwrap_or(DEFAULT_CHECK_INTERVAL)
    }

    pub fn summary(&self) -> PolicySummary {
        let window = self.active_window.as_ref();
        let defaults = ActiveWindowPolicy::from_raw(RawActiveWindow::default());

        PolicySummary {
            monitoring_enabled: self.monitoring_enabled(),
            active_window: window.map(|w| w.window.to_string()),
            check_interval_seconds: self.check_interval().as_secs(),
            warning_interval_seconds: window
                .unwrap_or(&defaults)
                .warning_interval
                .as_secs(),
            max_warnings: window.unwrap_or(&defaults).max_warnings,
            shutdown_at_end: window.is_some_and(|w| w.shutdown_at_end),
            scheduled_shutdown: self
                .scheduled_shutdown
                .as_ref()
                .filter(|s| s.enabled)
                .map(|s| s.time.clone()),
            strict_mode: self.strict_mode,
            dry_run: self.dry_run,
            block_keyword_count: self.rules.block_keywords.len(),
            allow_keyword_count: self.rules.allow_keywords.len(),
            blocklist_count: self.rules.blocklist.len(),
            whitelist_count: self.rules.whitelist.len(),
        }
    }
}

/// Daily focus window and escalation tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveWindowPolicy {
    pub enabled: bool,
    pub window: TimeWindow,
    pub check_interval: Duration,
    pub warning_interval: Duration,
    pub max_warnings: u32,
    pub shutdown_at_end: bool,
}

impl ActiveWindowPolicy {
    fn from_raw(raw: RawActiveWindow) -> Self {
        let start = parse_time(&raw.start_time).unwrap_or(WallClock { hour: 9, minute: 0 });
        let end = parse_time(&raw.end_time).unwrap_or(WallClock { hour: 23, minute: 59 });

        Self {
            enabled: raw.enabled,
            window: TimeWindow::new(start, end),
            check_interval: Duration::from_secs(raw.check_interval_seconds.max(1)),
            warning_interval: Duration::from_secs(raw.warning_interval_seconds),
            max_warnings: raw.max_warnings.max(1),
            shutdown_at_end: raw.shutdown_at_end,
        }
    }
}

/// Independent daily shutdown.
///
/// The time is kept as written; it is parsed when the job is armed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledShutdownPolicy {
    pub enabled: bool,
    pub time: String,
}

impl ScheduledShutdownPolicy {
    fn from_raw(raw: RawScheduledShutdown) -> Self {
        Self {
            enabled: raw.enabled,
            time: raw.time.trim().to_string(),
        }
    }

    pub fn at(&self) -> Result<WallClock, CurfewError> {
        WallClock::parse(&self.time)
    }
}

/// Normalized (lowercase, trimmed) matching rules
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    /// Order is significant: the first match names the reason
    pub block_keywords: Vec<String>,
    pub allow_keywords: Vec<String>,
    pub blocklist: MatchList,
    pub whitelist: MatchList,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchList {
    pub processes: Vec<String>,
    pub domains: Vec<String>,
}

impl MatchList {
    fn from_raw(raw: RawMatchList) -> Self {
        Self {
            processes: normalize_list(raw.processes),
            domains: normalize_list(raw.domains),
        }
    }

    pub fn len(&self) -> usize {
        self.processes.len() + self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize_list(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim().to_lowercase();
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
