//! Process liveness probing.
//!
//! The lock manager only needs one question answered about a recorded pid:
//! is that process still running on this host? The answer is behind a trait
//! so tests can script it.

/// Answers whether a process id belongs to a running process.
pub trait ProcessProbe: Send + Sync {
    fn is_process_alive(&self, pid: u32) -> bool;
}

/// Probes the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsProcessProbe;

impl ProcessProbe for OsProcessProbe {
    #[cfg(unix)]
    fn is_process_alive(&self, pid: u32) -> bool {
        if pid == 0 || pid > i32::MAX as u32 {
            return false;
        }

        // SAFETY: kill(pid, 0) does not send a signal; it only checks process existence/permissions.
        let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
        if rc == 0 {
            return true;
        }

        // EPERM: the process exists but belongs to another user
        matches!(
            std::io::Error::last_os_error().raw_os_error(),
            Some(code) if code == libc::EPERM
        )
    }

    #[cfg(not(unix))]
    fn is_process_alive(&self, pid: u32) -> bool {
        // No cheap probe; treat every holder as alive and rely on lock age.
        pid != 0
    }
}

#[cfg(test)]
pub(crate) use fake::FakeProcessProbe;
