//! Process liveness checks.

/// Check if a pid exists.
///
/// Uses `kill` with the null signal, which checks existence without
/// delivering anything.
#[cfg(unix)]
pub fn pid_exists(pid: u32) -> bool {
    use nix::sys::signal;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }

    match signal::kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => false, // No such process
        Err(_) => true,                         // Process exists but we lack permission
    }
}

#[cfg(not(unix))]
pub fn pid_exists(pid: u32) -> bool {
    let _ = pid;
    false
}
