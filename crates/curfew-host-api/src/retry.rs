//! Termination with a single normalized-name retry

use curfew_util::CurfewError;
use tracing::{info, warn};

use crate::HostAdapter;

const EXE_SUFFIX: &str = ".exe";

/// The executable name with the conventional `.exe` suffix toggled:
/// `steam` becomes `steam.exe` and `Steam.EXE` becomes `Steam`.
pub fn alternate_executable_name(executable: &str) -> String {
    let lower = executable.to_ascii_lowercase();
    match lower.strip_suffix(EXE_SUFFIX) {
        Some(stem) if !stem.is_empty() => executable[..stem.len()].to_string(),
        _ => format!("{}{}", executable, EXE_SUFFIX),
    }
}

/// Terminate `executable`, retrying once under its alternate name.
///
/// Returns the number of processes signalled. When both attempts fail the
/// error carries both causes; callers log it and move on.
pub async fn terminate_with_retry<H>(host: &H, executable: &str) -> Result<usize, CurfewError>
where
    H: HostAdapter + ?Sized,
{
    let first = match host.terminate(executable).await {
        Ok(count) => {
            info!(executable, count, "Terminated");
            return Ok(count);
        }
        Err(e) => e,
    };

    let alternate = alternate_executable_name(executable);
    warn!(
        executable,
        alternate = %alternate,
        error = %first,
        "Terminate failed, retrying with alternate name"
    );

    match host.terminate(&alternate).await {
        Ok(count) => {
            info!(executable = %alternate, count, "Terminated");
            Ok(count)
        }
        Err(second) => {
            warn!(executable, error = %second, "Terminate retry failed, giving up");
            Err(CurfewError::termination(
                executable,
                format!("{}; retry as '{}': {}", first, alternate, second),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockHost;

    #[test]
    fn alternate_name_toggles_suffix() {
        assert_eq!(alternate_executable_name("steam"), "steam.exe");
        assert_eq!(alternate_executable_name("steam.exe"), "steam");
        assert_eq!(alternate_executable_name("Steam.EXE"), "Steam");
        assert_eq!(alternate_executable_name(".exe"), ".exe.exe");
    }

    #[tokio::test]
    async fn direct_hit_does_not_retry() {
        let host = MockHost::new();
        host.add_process("steam");

        assert_eq!(terminate_with_retry(&host, "steam").await.unwrap(), 1);
        assert_eq!(host.terminate_calls(), vec!["steam"]);
    }

    #[tokio::test]
    async fn retry_uses_alternate_name() {
        let host = MockHost::new();
        host.add_process("steam");

        assert_eq!(terminate_with_retry(&host, "steam.exe").await.unwrap(), 1);
        assert_eq!(host.terminate_calls(), vec!["steam.exe", "steam"]);
        assert!(host.running_processes().is_empty());
    }

    #[tokio::test]
    async fn second_failure_is_reported_once() {
        let host = MockHost::new();

        let err = terminate_with_retry(&host, "lutris").await.unwrap_err();
        assert!(matches!(
            err,
            CurfewError::TerminationFailed { ref executable, .. } if executable == "lutris"
        ));
        assert_eq!(host.terminate_calls().len(), 2);
    }
}
