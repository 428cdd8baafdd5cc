//! Signal delivery by pid.

use flock_core::{ProcessError, ProcessSignalPort, Signal};

use crate::pidfile::pid_exists;

/// [`ProcessSignalPort`] backed by `kill(2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSignals;

impl OsSignals {
    pub const fn new() -> Self {
        Self
    }
}

impl ProcessSignalPort for OsSignals {
    fn is_alive(&self, pid: u32) -> bool {
        pid_exists(pid)
    }

    fn signal(&self, pid: u32, signal: Signal) -> Result<(), ProcessError> {
        deliver_signal(pid, signal)
    }
}

/// Send `signal` to `pid`.
#[cfg(unix)]
pub fn deliver_signal(pid: u32, signal: Signal) -> Result<(), ProcessError> {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let raw = i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .ok_or(ProcessError::NoSuchProcess(pid))?;

    match kill(Pid::from_raw(raw), to_nix(signal)) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => Err(ProcessError::NoSuchProcess(pid)),
        Err(Errno::EPERM) => Err(ProcessError::PermissionDenied(pid)),
        Err(e) => Err(ProcessError::SignalFailed(format!("{signal} to {pid}: {e}"))),
    }
}

#[cfg(not(unix))]
pub fn deliver_signal(pid: u32, signal: Signal) -> Result<(), ProcessError> {
    Err(ProcessError::SignalFailed(format!(
        "{signal} to {pid}: signals are not supported on this platform"
    )))
}

#[cfg(unix)]
pub(crate) const fn to_nix(signal: Signal) -> nix::sys::signal::Signal {
    use nix::sys::signal::Signal as Nix;

    match signal {
        Signal::Interrupt => Nix::SIGINT,
        Signal::HangUp => Nix::SIGHUP,
        Signal::Terminate => Nix::SIGTERM,
        Signal::Quit => Nix::SIGQUIT,
        Signal::Kill => Nix::SIGKILL,
        Signal::User1 => Nix::SIGUSR1,
        Signal::User2 => Nix::SIGUSR2,
    }
}
