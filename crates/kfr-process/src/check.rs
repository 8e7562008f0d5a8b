//! Process existence checking.

use crate::terminate::SignalError;

/// Check if a process with the given PID exists.
///
/// On Unix this sends signal 0 (`kill(pid, 0)`), which delivers nothing but
/// reports whether the PID is known. A zombie that has not been reaped still
/// counts as existing, so callers that own the child must reap it before
/// asking.
///
/// # Returns
///
/// * `Ok(true)` - Process exists
/// * `Ok(false)` - Process does not exist
/// * `Err(_)` - The check itself failed
pub fn process_exists(pid: u32) -> Result<bool, SignalError> {
    if pid == 0 {
        return Err(SignalError::InvalidPid { pid });
    }

    #[cfg(unix)]
    {
        process_exists_unix(pid)
    }

    #[cfg(windows)]
    {
        process_exists_windows(pid)
    }
}

#[cfg(unix)]
fn process_exists_unix(pid: u32) -> Result<bool, SignalError> {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        // Exists, owned by someone else.
        Err(Errno::EPERM) => Ok(true),
        Err(errno) => Err(SignalError::Errno {
            pid,
            action: "probe",
            errno,
        }),
    }
}

#[cfg(windows)]
fn process_exists_windows(pid: u32) -> Result<bool, SignalError> {
    use windows::Win32::Foundation::{CloseHandle, STILL_ACTIVE};
    use windows::Win32::System::Threading::{
        GetExitCodeProcess, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
    };

    unsafe {
        let handle = match OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) {
            Ok(h) => h,
            Err(_) => return Ok(false),
        };

        let mut code = 0u32;
        let alive = GetExitCodeProcess(handle, &mut code).is_ok() && code == STILL_ACTIVE.0 as u32;
        let _ = CloseHandle(handle);
        Ok(alive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_process_exists() {
        assert!(process_exists(std::process::id()).unwrap());
    }

    #[test]
    fn test_pid_zero_rejected() {
        assert!(matches!(
            process_exists(0),
            Err(SignalError::InvalidPid { pid: 0 })
        ));
    }

    #[test]
    #[cfg(unix)]
    fn test_reaped_child_is_gone() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id();
        child.wait().unwrap();
        assert!(!process_exists(pid).unwrap());
    }
}
