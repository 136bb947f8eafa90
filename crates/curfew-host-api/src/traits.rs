//! Host adapter traits

use async_trait::async_trait;
use curfew_api::ForegroundWindow;
use thiserror::Error;

/// Errors from host adapter operations
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Foreground window query failed: {0}")]
    WindowQueryFailed(String),

    #[error("No running process named '{0}'")]
    NoMatchingProcess(String),

    #[error("Terminate failed: {0}")]
    TerminateFailed(String),

    #[error("Shutdown failed: {0}")]
    ShutdownFailed(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// Host adapter trait - implemented by platform-specific adapters
#[async_trait]
pub trait HostAdapter: Send + Sync {
    /// The window currently holding input focus.
    ///
    /// `Ok(None)` means there is no focused window (e.g. an empty desktop).
    async fn foreground_window(&self) -> HostResult<Option<ForegroundWindow>>;

    /// Forcefully terminate every process whose executable name matches
    /// `executable` (case-insensitive). Returns how many were signalled.
    async fn terminate(&self, executable: &str) -> HostResult<usize>;

    /// Power the machine off with no delay
    async fn shutdown(&self) -> HostResult<()>;

    /// Optional: check if the host adapter is healthy
    fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_error_messages() {
        assert_eq!(
            HostError::NoMatchingProcess("steam".into()).to_string(),
            "No running process named 'steam'"
        );
        let io: HostError = std::io::Error::other("boom").into();
        assert!(matches!(io, HostError::Io(_)));
    }
}
