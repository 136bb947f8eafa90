//! Mock host adapter for testing

use async_trait::async_trait;
use curfew_api::ForegroundWindow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{HostAdapter, HostError, HostResult};

/// Mock host adapter for unit/integration testing.
///
/// Holds a fake focused window and a fake process table; records every
/// terminate and shutdown call.
pub struct MockHost {
    foreground: Arc<Mutex<Option<ForegroundWindow>>>,
    processes: Arc<Mutex<Vec<String>>>,
    terminate_calls: Arc<Mutex<Vec<String>>>,
    shutdown_calls: AtomicUsize,

    /// Configure the foreground query to fail with this message
    pub fail_query: Arc<Mutex<Option<String>>>,

    /// Configure terminate to fail regardless of the process table
    pub fail_terminate: Arc<Mutex<bool>>,

    /// Configure shutdown to fail
    pub fail_shutdown: Arc<Mutex<bool>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            foreground: Arc::new(Mutex::new(None)),
            processes: Arc::new(Mutex::new(Vec::new())),
            terminate_calls: Arc::new(Mutex::new(Vec::new())),
            shutdown_calls: AtomicUsize::new(0),
            fail_query: Arc::new(Mutex::new(None)),
            fail_terminate: Arc::new(Mutex::new(false)),
            fail_shutdown: Arc::new(Mutex::new(false)),
        }
    }

    /// Set the window the next queries will report
    pub fn set_foreground(&self, window: Option<ForegroundWindow>) {
        *lock(&self.foreground) = window;
    }

    /// Add a process to the fake process table
    pub fn add_process(&self, executable: impl Into<String>) {
        lock(&self.processes).push(executable.into());
    }

    pub fn running_processes(&self) -> Vec<String> {
        lock(&self.processes).clone()
    }

    /// Executable names passed to `terminate`, in call order
    pub fn terminate_calls(&self) -> Vec<String> {
        lock(&self.terminate_calls).clone()
    }

    pub fn shutdown_calls(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_query(&self, message: Option<&str>) {
        *lock(&self.fail_query) = message.map(str::to_string);
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostAdapter for MockHost {
    async fn foreground_window(&self) -> HostResult<Option<ForegroundWindow>> {
        if let Some(message) = lock(&self.fail_query).clone() {
            return Err(HostError::WindowQueryFailed(message));
        }
        Ok(lock(&self.foreground).clone())
    }

    async fn terminate(&self, executable: &str) -> HostResult<usize> {
        lock(&self.terminate_calls).push(executable.to_string());

        if *lock(&self.fail_terminate) {
            return Err(HostError::TerminateFailed("Mock terminate failure".into()));
        }

        let mut processes = lock(&self.processes);
        let before = processes.len();
        processes.retain(|p| !p.eq_ignore_ascii_case(executable));
        let killed = before - processes.len();

        if killed == 0 {
            Err(HostError::NoMatchingProcess(executable.to_string()))
        } else {
            Ok(killed)
        }
    }

    async fn shutdown(&self) -> HostResult<()> {
        if *lock(&self.fail_shutdown) {
            return Err(HostError::ShutdownFailed("Mock shutdown failure".into()));
        }
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_foreground_and_terminate() {
        let host = MockHost::new();
        assert!(host.foreground_window().await.unwrap().is_none());

        host.set_foreground(Some(ForegroundWindow::new("steam", "Steam")));
        host.add_process("steam");
        host.add_process("Steam");
        host.add_process("firefox");

        let window = host.foreground_window().await.unwrap().unwrap();
        assert_eq!(window.app_key(), "steam");

        assert_eq!(host.terminate("STEAM").await.unwrap(), 2);
        assert_eq!(host.running_processes(), vec!["firefox"]);
        assert!(matches!(
            host.terminate("steam").await,
            Err(HostError::NoMatchingProcess(_))
        ));
    }

    #[tokio::test]
    async fn mock_failures() {
        let host = MockHost::new();
        host.set_fail_query(Some("no display"));
        assert!(matches!(
            host.foreground_window().await,
            Err(HostError::WindowQueryFailed(_))
        ));

        *host.fail_shutdown.lock().unwrap() = true;
        assert!(host.shutdown().await.is_err());
        assert_eq!(host.shutdown_calls(), 0);

        *host.fail_shutdown.lock().unwrap() = false;
        host.shutdown().await.unwrap();
        assert_eq!(host.shutdown_calls(), 1);
    }
}
