//! Error types for curfew

use thiserror::Error;

/// Shared error taxonomy for the enforcement engine.
///
/// None of these are fatal: each one degrades to "skip this cycle" or
/// "don't arm this feature".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurfewError {
    #[error("Invalid time format '{value}': {message}")]
    InvalidTimeFormat { value: String, message: String },

    #[error("Foreground window query failed: {0}")]
    WindowQueryFailed(String),

    #[error("Failed to terminate '{executable}': {message}")]
    TerminationFailed { executable: String, message: String },

    #[error("Configuration section [{0}] is missing")]
    ConfigMissingSection(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CurfewError {
    pub fn window_query(msg: impl Into<String>) -> Self {
        Self::WindowQueryFailed(msg.into())
    }

    pub fn termination(executable: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::TerminationFailed {
            executable: executable.into(),
            message: msg.into(),
        }
    }

    pub fn missing_section(section: impl Into<String>) -> Self {
        Self::ConfigMissingSection(section.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, CurfewError>;
