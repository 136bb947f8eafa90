//! Process table scanning and signalling

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use curfew_host_api::{HostError, HostResult};

/// Default procfs mount point
pub const PROC_ROOT: &str = "/proc";

/// One running process as seen in procfs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    /// Contents of `/proc/<pid>/comm` (truncated to 15 bytes by the kernel)
    pub comm: String,
    /// Target of `/proc/<pid>/exe` without the kernel's `" (deleted)"`
    /// marker, if readable
    pub exe: Option<PathBuf>,
}

impl ProcessEntry {
    /// Basename of the executable, when known
    pub fn exe_name(&self) -> Option<String> {
        self.exe
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
    }

    /// Case-insensitive exact match against comm or the executable basename
    pub fn matches(&self, executable: &str) -> bool {
        self.comm.eq_ignore_ascii_case(executable)
            || self
                .exe_name()
                .is_some_and(|name| name.eq_ignore_ascii_case(executable))
    }
}

/// Suffix the kernel appends to `exe` once the binary was replaced on disk
const DELETED_SUFFIX: &str = " (deleted)";

fn strip_deleted(exe: PathBuf) -> PathBuf {
    match exe.to_str().and_then(|s| s.strip_suffix(DELETED_SUFFIX)) {
        Some(stripped) => PathBuf::from(stripped),
        None => exe,
    }
}

/// Read a single process. `None` if it vanished or is not a process dir.
pub fn read_process(proc_root: &Path, pid: u32) -> Option<ProcessEntry> {
    let dir = proc_root.join(pid.to_string());
    let comm = fs::read_to_string(dir.join("comm")).ok()?;
    let exe = fs::read_link(dir.join("exe")).ok().map(strip_deleted);

    Some(ProcessEntry {
        pid,
        comm: comm.trim_end_matches('\n').to_string(),
        exe,
    })
}

/// Every process visible under `proc_root`
pub fn list_processes(proc_root: &Path) -> HostResult<Vec<ProcessEntry>> {
    let mut processes = Vec::new();

    for entry in fs::read_dir(proc_root)? {
        let Ok(entry) = entry else { continue };
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };
        // Processes exit while we scan
        if let Some(process) = read_process(proc_root, pid) {
            processes.push(process);
        }
    }

    Ok(processes)
}

/// PIDs running `executable`, never including our own
pub fn find_pids(proc_root: &Path, executable: &str) -> HostResult<Vec<u32>> {
    let own_pid = std::process::id();
    let mut pids: Vec<u32> = list_processes(proc_root)?
        .into_iter()
        .filter(|p| p.pid != own_pid && p.matches(executable))
        .map(|p| p.pid)
        .collect();
    pids.sort_unstable();
    Ok(pids)
}

/// Send `sig` to each PID. Processes that already exited are skipped.
/// Returns how many were signalled.
pub fn signal_pids(pids: &[u32], sig: Signal) -> HostResult<usize> {
    let mut signalled = 0;
    let mut last_error = None;

    for &pid in pids {
        match signal::kill(Pid::from_raw(pid as i32), sig) {
            Ok(()) => {
                debug!(pid, signal = ?sig, "Signalled process");
                signalled += 1;
            }
            Err(nix::errno::Errno::ESRCH) => {
                // Already gone
            }
            Err(e) => {
                warn!(pid, error = %e, "Failed to signal process");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(nix::errno::Errno::EPERM) if signalled == 0 => Err(HostError::PermissionDenied(
            format!("not allowed to signal {:?}", pids),
        )),
        Some(e) if signalled == 0 => Err(HostError::TerminateFailed(e.to_string())),
        _ => Ok(signalled),
    }
}

/// SIGKILL every process running `executable`
pub fn kill_by_executable(proc_root: &Path, executable: &str) -> HostResult<usize> {
    let pids = find_pids(proc_root, executable)?;
    if pids.is_empty() {
        return Err(HostError::NoMatchingProcess(executable.to_string()));
    }

    let signalled = signal_pids(&pids, Signal::SIGKILL)?;
    if signalled == 0 {
        // Every match exited between the scan and the kill
        return Err(HostError::NoMatchingProcess(executable.to_string()));
    }
    Ok(signalled)
}
