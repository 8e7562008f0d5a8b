//! Process termination primitives.
//!
//! The graceful signal is `SIGTERM` on Unix and `CTRL_BREAK` on Windows. The
//! Windows variant only reaches children spawned with
//! `CREATE_NEW_PROCESS_GROUP`, which the runner always sets.

use thiserror::Error;
use tracing::debug;

/// Failure to deliver a signal to a process.
#[derive(Debug, Clone, Error)]
pub enum SignalError {
    #[error("Invalid PID: {pid}")]
    InvalidPid { pid: u32 },

    #[cfg(unix)]
    #[error("Failed to {action} PID {pid}: {errno}")]
    Errno {
        pid: u32,
        action: &'static str,
        errno: nix::errno::Errno,
    },

    #[error("Failed to {action} PID {pid}: {reason}")]
    Failed {
        pid: u32,
        action: &'static str,
        reason: String,
    },
}

impl SignalError {
    pub fn failed(pid: u32, action: &'static str, reason: impl Into<String>) -> Self {
        Self::Failed {
            pid,
            action,
            reason: reason.into(),
        }
    }

    /// True when the target had already exited.
    pub fn is_gone(&self) -> bool {
        #[cfg(unix)]
        {
            matches!(
                self,
                Self::Errno {
                    errno: nix::errno::Errno::ESRCH,
                    ..
                }
            )
        }
        #[cfg(windows)]
        {
            false
        }
    }
}

/// Ask a process to exit (SIGTERM on Unix, Ctrl+Break on Windows).
pub fn terminate_gracefully(pid: u32) -> Result<(), SignalError> {
    if pid == 0 {
        return Err(SignalError::InvalidPid { pid });
    }
    debug!(pid, "Sending graceful termination signal");

    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(|errno| SignalError::Errno {
            pid,
            action: "terminate",
            errno,
        })
    }

    #[cfg(windows)]
    {
        use windows::Win32::System::Console::{GenerateConsoleCtrlEvent, CTRL_BREAK_EVENT};

        unsafe {
            GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pid)
                .map_err(|e| SignalError::failed(pid, "terminate", e.to_string()))
        }
    }
}

/// Force kill a process (SIGKILL on Unix, TerminateProcess on Windows).
pub fn force_kill(pid: u32) -> Result<(), SignalError> {
    if pid == 0 {
        return Err(SignalError::InvalidPid { pid });
    }
    debug!(pid, "Force killing process");

    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        kill(Pid::from_raw(pid as i32), Signal::SIGKILL).map_err(|errno| SignalError::Errno {
            pid,
            action: "kill",
            errno,
        })
    }

    #[cfg(windows)]
    {
        use windows::Win32::Foundation::CloseHandle;
        use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

        unsafe {
            let handle = match OpenProcess(PROCESS_TERMINATE, false, pid) {
                Ok(h) if !h.is_invalid() => h,
                _ => {
                    return Err(SignalError::failed(
                        pid,
                        "kill",
                        "failed to open process for termination",
                    ))
                }
            };

            let result = TerminateProcess(handle, 1);
            let _ = CloseHandle(handle);

            result.map_err(|e| SignalError::failed(pid, "kill", e.to_string()))
        }
    }
}
