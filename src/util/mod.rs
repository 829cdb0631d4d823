use std::io;
use std::os::unix::prelude::*;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use nix::sys::wait::WaitStatus;

pub use self::unix::isatty;

pub mod unix;

/// Smsh Utility Extensions for `ExitStatus`
pub trait SmshExitStatusExt {
    /// Create an ExitStatus to indicate *successful* program execution.
    fn from_success() -> Self;

    /// Create an ExitStatus to indicate *unsuccessful* program execution.
    fn from_failure() -> Self;

    /// Create an ExitStatus from a status code
    fn from_status(code: i32) -> Self;
}

impl SmshExitStatusExt for ExitStatus {
    /// # Examples
    /// ```rust
    /// use smsh::SmshExitStatusExt;
    /// use std::process::ExitStatus;
    /// assert!(ExitStatus::from_success().success());
    /// ```
    fn from_success() -> Self {
        ExitStatus::from_status(0)
    }

    /// # Examples
    /// ```rust
    /// use smsh::SmshExitStatusExt;
    /// use std::process::ExitStatus;
    /// assert!(!ExitStatus::from_failure().success());
    /// ```
    fn from_failure() -> Self {
        ExitStatus::from_status(1)
    }

    /// # Examples
    /// ```rust
    /// use smsh::SmshExitStatusExt;
    /// use std::process::ExitStatus;
    /// assert!(ExitStatus::from_status(0).success());
    /// assert!(!ExitStatus::from_status(1).success());
    /// ```
    fn from_status(code: i32) -> Self {
        ExitStatus::from_raw(code << 8)
    }
}

/// Shell-style status for a reaped process: its exit code, or 128 + signal
/// number when it was killed. `None` for statuses that do not end a process.
pub fn exit_status_of(wait_status: &WaitStatus) -> Option<ExitStatus> {
    match *wait_status {
        WaitStatus::Exited(_, code) => Some(ExitStatus::from_status(code)),
        WaitStatus::Signaled(_, signal, _) => Some(ExitStatus::from_status(128 + signal as i32)),
        _ => None,
    }
}

pub fn get_terminal() -> RawFd {
    io::stdin().as_raw_fd()
}
