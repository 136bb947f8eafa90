//! Time utilities for curfew
//!
//! Provides both monotonic time (for warning intervals and countdowns) and
//! wall-clock time (for the active window and daily shutdown triggers).
//!
//! # Mock Time for Development
//!
//! In debug builds, the `CURFEW_MOCK_TIME` environment variable can be set
//! to override the system time for all wall-clock decisions. This is useful
//! for exercising the active window and the scheduled shutdown without
//! waiting for the evening.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 22:59:30`)
//!
//! Example:
//! ```bash
//! CURFEW_MOCK_TIME="2025-12-25 22:59:30" curfewd --dry-run
//! ```

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::CurfewError;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "CURFEW_MOCK_TIME";

/// Cached mock time offset from the real time when the process started.
/// This allows mock time to advance naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<ChronoDuration>> = OnceLock::new();

/// Returns the offset between mock time and real time at process start.
#[allow(clippy::disallowed_methods)] // This is the internal implementation that wraps Local::now()
fn get_mock_time_offset() -> Option<ChronoDuration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match NaiveDateTime::parse_from_str(&mock_time_str, "%Y-%m-%d %H:%M:%S") {
                    Ok(naive_dt) => match Local.from_local_datetime(&naive_dt).single() {
                        Some(mock_dt) => {
                            let offset = mock_dt.signed_duration_since(Local::now());
                            tracing::info!(
                                mock_time = %mock_time_str,
                                offset_secs = offset.num_seconds(),
                                "Mock time enabled"
                            );
                            return Some(offset);
                        }
                        None => {
                            tracing::warn!(
                                mock_time = %mock_time_str,
                                "Failed to convert mock time to local timezone"
                            );
                        }
                    },
                    Err(_) => {
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            expected_format = "%Y-%m-%d %H:%M:%S",
                            "Invalid mock time format"
                        );
                    }
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = Local::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Represents a point in monotonic time.
/// This is immune to wall-clock changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonotonicInstant(Instant);

impl MonotonicInstant {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub fn from_instant(instant: Instant) -> Self {
        Self(instant)
    }

    pub fn as_instant(&self) -> Instant {
        self.0
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }

    /// Duration since `earlier`, saturating at zero.
    pub fn duration_since(&self, earlier: MonotonicInstant) -> Duration {
        self.0.saturating_duration_since(earlier.0)
    }

    /// Returns duration until `self`, or zero if `self` is in the past
    pub fn saturating_duration_until(&self, from: MonotonicInstant) -> Duration {
        self.0.saturating_duration_since(from.0)
    }
}

impl std::ops::Add<Duration> for MonotonicInstant {
    type Output = MonotonicInstant;

    fn add(self, rhs: Duration) -> Self::Output {
        MonotonicInstant(self.0 + rhs)
    }
}

/// Time of day with minute resolution, as written in `HH:MM` config values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WallClock {
    pub hour: u8,
    pub minute: u8,
}

impl WallClock {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    /// Parse an `HH:MM` string. Single-digit hours (`7:05`) are accepted,
    /// minutes must have two digits.
    pub fn parse(s: &str) -> Result<Self, CurfewError> {
        let invalid = |message: &str| CurfewError::InvalidTimeFormat {
            value: s.to_string(),
            message: message.to_string(),
        };

        let (hour, minute) = s.trim().split_once(':').ok_or_else(|| invalid("expected HH:MM"))?;

        if hour.is_empty() || hour.len() > 2 || !hour.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("invalid hour"));
        }
        if minute.len() != 2 || !minute.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("invalid minute"));
        }

        let hour: u8 = hour.parse().map_err(|_| invalid("invalid hour"))?;
        let minute: u8 = minute.parse().map_err(|_| invalid("invalid minute"))?;

        if hour >= 24 {
            return Err(invalid("hour must be 0-23"));
        }
        if minute >= 60 {
            return Err(invalid("minute must be 0-59"));
        }

        Ok(Self { hour, minute })
    }

    pub fn from_naive_time(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    pub fn of(dt: &DateTime<Local>) -> Self {
        Self::from_naive_time(dt.time())
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, 0).unwrap_or(NaiveTime::MIN)
    }

    /// Returns minutes since midnight
    pub fn minutes_from_midnight(&self) -> u16 {
        (self.hour as u16) * 60 + self.minute as u16
    }

    /// The first instant strictly after `after` whose local time is this
    /// wall clock, i.e. the next daily firing.
    pub fn next_occurrence_after(&self, after: &DateTime<Local>) -> DateTime<Local> {
        let mut date = after.date_naive();
        // Two iterations cover "later today" and "tomorrow"; the extra ones
        // only matter when a DST gap swallows the target minute.
        for _ in 0..4 {
            let naive = date.and_time(self.to_naive_time());
            let candidate = Local
                .from_local_datetime(&naive)
                .earliest()
                .or_else(|| Local.from_local_datetime(&(naive + ChronoDuration::hours(1))).earliest());
            if let Some(candidate) = candidate
                && candidate > *after
            {
                return candidate;
            }
            date = date.succ_opt().unwrap_or(date);
        }
        *after + ChronoDuration::days(1)
    }
}

impl PartialOrd for WallClock {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WallClock {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.minutes_from_midnight().cmp(&other.minutes_from_midnight())
    }
}

impl fmt::Display for WallClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for WallClock {
    type Err = CurfewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Whether `now` lies inside the daily window `[start, end)`.
///
/// A window whose start is after its end crosses midnight
/// (e.g. 22:00 - 06:00).
pub fn is_within_window(now: WallClock, start: WallClock, end: WallClock) -> bool {
    let now = now.minutes_from_midnight();
    let start = start.minutes_from_midnight();
    let end = end.minutes_from_midnight();

    if start <= end {
        now >= start && now < end
    } else {
        now >= start || now < end
    }
}

/// A daily time window during which enforcement applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: WallClock,
    pub end: WallClock,
}

impl TimeWindow {
    pub fn new(start: WallClock, end: WallClock) -> Self {
        Self { start, end }
    }

    /// Check if the given local datetime falls within this window
    pub fn contains(&self, dt: &DateTime<Local>) -> bool {
        is_within_window(WallClock::of(dt), self.start, self.end)
    }

    pub fn crosses_midnight(&self) -> bool {
        self.start > self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Helper to format durations in human-readable form
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
