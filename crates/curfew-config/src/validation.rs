//! Configuration validation

use crate::schema::RawConfig;
use curfew_util::{CurfewError, WallClock};
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid time format for {field} '{value}': {message}")]
    InvalidTimeFormat {
        field: String,
        value: String,
        message: String,
    },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Validate a raw configuration
///
/// The scheduled shutdown time is deliberately not checked here: it is
/// parsed when the job is armed and only that job is skipped if it is bad.
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(window) = &config.active_window {
        for (field, value) in [
            ("active_window.start_time", &window.start_time),
            ("active_window.end_time", &window.end_time),
        ] {
            if let Err(e) = parse_time(value) {
                errors.push(time_error(field, e));
            }
        }

        if window.max_warnings == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "active_window.max_warnings".into(),
                message: "must be at least 1".into(),
            });
        }

        if window.check_interval_seconds == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "active_window.check_interval_seconds".into(),
                message: "must be at least 1".into(),
            });
        }
    }

    errors
}

/// Sections that are absent from the file. Each one simply disables a
/// feature; callers report them, they never fail the load.
pub fn missing_sections(config: &RawConfig) -> Vec<CurfewError> {
    let mut missing = Vec::new();

    if config.active_window.is_none() {
        missing.push(CurfewError::missing_section("active_window"));
    }
    if config.scheduled_shutdown.is_none() {
        missing.push(CurfewError::missing_section("scheduled_shutdown"));
    }
    if config.blocklist.is_none() {
        missing.push(CurfewError::missing_section("blocklist"));
    }
    if config.whitelist.is_none() {
        missing.push(CurfewError::missing_section("whitelist"));
    }

    missing
}

/// Parse HH:MM time format
pub fn parse_time(s: &str) -> Result<WallClock, CurfewError> {
    WallClock::parse(s)
}

fn time_error(field: &str, error: CurfewError) -> ValidationError {
    match error {
        CurfewError::InvalidTimeFormat { value, message } => ValidationError::InvalidTimeFormat {
            field: field.to_string(),
            value,
            message,
        },
        other => ValidationError::InvalidValue {
            field: field.to_string(),
            message: other.to_string(),
        },
    }
}
