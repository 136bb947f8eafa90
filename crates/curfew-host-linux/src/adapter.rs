//! Linux host adapter implementation

use async_trait::async_trait;
use curfew_api::ForegroundWindow;
use curfew_host_api::{HostAdapter, HostError, HostResult};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{info, warn};

use crate::{kill_by_executable, query_foreground, PROC_ROOT};

/// Linux host adapter
pub struct LinuxHost {
    proc_root: PathBuf,
}

impl LinuxHost {
    pub fn new() -> Self {
        Self {
            proc_root: PathBuf::from(PROC_ROOT),
        }
    }

    /// Read processes from another procfs mount
    pub fn with_proc_root(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }
}

impl Default for LinuxHost {
    fn default() -> Self {
        Self::new()
    }
}

async fn run(program: &str, args: &[&str]) -> Result<(), String> {
    let status = Command::new(program)
        .args(args)
        .status()
        .await
        .map_err(|e| format!("{}: {}", program, e))?;

    if status.success() {
        Ok(())
    } else {
        Err(format!("{} exited with {}", program, status))
    }
}

#[async_trait]
impl HostAdapter for LinuxHost {
    async fn foreground_window(&self) -> HostResult<Option<ForegroundWindow>> {
        query_foreground(&self.proc_root).await
    }

    async fn terminate(&self, executable: &str) -> HostResult<usize> {
        let count = kill_by_executable(&self.proc_root, executable)?;
        info!(executable, count, "Sent SIGKILL");
        Ok(count)
    }

    async fn shutdown(&self) -> HostResult<()> {
        info!("Powering off");

        match run("systemctl", &["poweroff"]).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "systemctl poweroff failed, trying shutdown");
                run("shutdown", &["-h", "now"])
                    .await
                    .map_err(|fallback| HostError::ShutdownFailed(format!("{}; {}", e, fallback)))
            }
        }
    }

    fn is_healthy(&self) -> bool {
        self.proc_root.is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn terminate_unknown_executable_fails() {
        let root = tempfile::tempdir().unwrap();
        let host = LinuxHost::with_proc_root(root.path());

        assert!(host.is_healthy());
        assert!(matches!(
            host.terminate("steam").await,
            Err(HostError::NoMatchingProcess(_))
        ));
    }

    #[tokio::test]
    async fn missing_proc_root_is_unhealthy() {
        let host = LinuxHost::with_proc_root("/nonexistent/proc");
        assert!(!host.is_healthy());
        assert!(matches!(host.terminate("steam").await, Err(HostError::Io(_))));
    }
}
