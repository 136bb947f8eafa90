//! Focused window lookup

use curfew_api::ForegroundWindow;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use curfew_host_api::{HostError, HostResult};

use crate::read_process;

/// Parse the output of `xdotool getactivewindow getwindowpid getwindowname`.
///
/// The first line is the PID when the window advertises one; the rest is
/// the title. Empty output means no window has focus.
pub fn parse_xdotool_output(stdout: &str) -> Option<(Option<u32>, String)> {
    let stdout = stdout.trim_end_matches('\n');
    if stdout.trim().is_empty() {
        return None;
    }

    match stdout.split_once('\n') {
        Some((first, rest)) => match first.trim().parse::<u32>() {
            Ok(pid) => Some((Some(pid), rest.to_string())),
            Err(_) => Some((None, stdout.to_string())),
        },
        None => match stdout.trim().parse::<u32>() {
            Ok(pid) => Some((Some(pid), String::new())),
            Err(_) => Some((None, stdout.to_string())),
        },
    }
}

/// Build the snapshot for a window owned by `pid`
pub fn describe_window(proc_root: &Path, pid: Option<u32>, title: String) -> ForegroundWindow {
    let process = pid.and_then(|pid| read_process(proc_root, pid));

    match (pid, process) {
        (Some(pid), Some(process)) => {
            let mut window = ForegroundWindow::new(process.comm, title).with_pid(pid);
            window.executable_path = process.exe;
            window
        }
        (Some(pid), None) => ForegroundWindow::new("unknown", title).with_pid(pid),
        (None, _) => ForegroundWindow::new("unknown", title),
    }
}

/// Longest a single window query may take before the tick is skipped
pub const WINDOW_QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Run a query command, killing it if it outlives `limit`
pub async fn run_query(mut command: Command, limit: Duration) -> HostResult<Output> {
    command.kill_on_drop(true);
    let program = command.as_std().get_program().to_string_lossy().into_owned();

    match tokio::time::timeout(limit, command.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(HostError::WindowQueryFailed(format!(
            "failed to run {}: {}",
            program, e
        ))),
        Err(_) => {
            warn!(%program, timeout = ?limit, "Window query timed out");
            Err(HostError::WindowQueryFailed(format!(
                "{} timed out after {:?}",
                program, limit
            )))
        }
    }
}

/// Ask the X server which window has focus
pub async fn query_foreground(proc_root: &Path) -> HostResult<Option<ForegroundWindow>> {
    let mut command = Command::new("xdotool");
    command.args(["getactivewindow", "getwindowpid", "getwindowname"]);
    let output = run_query(command, WINDOW_QUERY_TIMEOUT).await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(HostError::WindowQueryFailed(format!(
            "xdotool exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let Some((pid, title)) = parse_xdotool_output(&stdout) else {
        debug!("No focused window");
        return Ok(None);
    };

    Ok(Some(describe_window(proc_root, pid, title)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn parse_pid_and_title() {
        assert_eq!(
            parse_xdotool_output("4242\nCats - YouTube - Mozilla Firefox\n"),
            Some((Some(4242), "Cats - YouTube - Mozilla Firefox".to_string()))
        );
    }

    #[test]
    fn parse_title_without_pid() {
        assert_eq!(
            parse_xdotool_output("xterm\n"),
            Some((None, "xterm".to_string()))
        );
        assert_eq!(parse_xdotool_output("\n"), None);
        assert_eq!(parse_xdotool_output(""), None);
    }

    #[test]
    fn describe_reads_proc() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("77");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("comm"), "steam\n").unwrap();
        std::os::unix::fs::symlink("/opt/steam/Steam", dir.join("exe")).unwrap();

        let window = describe_window(root.path(), Some(77), "Steam".into());
        assert_eq!(window.process_name, "steam");
        assert_eq!(window.pid, Some(77));
        assert_eq!(window.app_key(), "steam");

        let gone = describe_window(root.path(), Some(78), "Ghost".into());
        assert_eq!(gone.process_name, "unknown");
        assert_eq!(gone.pid, Some(78));
    }

    #[tokio::test]
    async fn hung_query_times_out() {
        let mut command = Command::new("sleep");
        command.arg("30");

        let started = std::time::Instant::now();
        let result = run_query(command, Duration::from_millis(100)).await;

        assert!(matches!(
            result,
            Err(HostError::WindowQueryFailed(message)) if message.contains("timed out")
        ));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_query_tool_is_a_query_failure() {
        let command = Command::new("curfew-no-such-tool");
        assert!(matches!(
            run_query(command, WINDOW_QUERY_TIMEOUT).await,
            Err(HostError::WindowQueryFailed(_))
        ));
    }

    #[test]
    fn replaced_binary_keeps_killable_app_key() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("77");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("comm"), "firefox\n").unwrap();
        std::os::unix::fs::symlink("/usr/lib/firefox/firefox (deleted)", dir.join("exe")).unwrap();

        let window = describe_window(root.path(), Some(77), "Mozilla Firefox".into());
        assert_eq!(window.app_key(), "firefox");
        assert_eq!(
            crate::find_pids(root.path(), &window.app_key()).unwrap(),
            vec![77]
        );
    }
}
