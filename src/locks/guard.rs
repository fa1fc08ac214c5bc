//! RAII handle for an acquired session lock.

use super::manager::Shared;
use super::registry::Ticket;
use crate::error::Result;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One caller's share of a session lock.
///
/// Dropping the handle releases it. When the last handle for a session file
/// is released, the lock file is deleted. Releasing is idempotent, and a
/// handle whose lock was force-released by the watchdog releases nothing.
pub struct LockHandle {
    shared: Arc<Shared>,
    canonical_path: PathBuf,
    lock_path: PathBuf,
    ticket: Ticket,
    released: bool,
}

impl LockHandle {
    pub(super) fn new(
        shared: Arc<Shared>,
        canonical_path: PathBuf,
        lock_path: PathBuf,
        ticket: Ticket,
    ) -> Self {
        Self {
            shared,
            canonical_path,
            lock_path,
            ticket,
            released: false,
        }
    }

    /// The symlink-resolved session file this handle locks.
    pub fn session_path(&self) -> &Path {
        &self.canonical_path
    }

    /// Path to the lock file on disk.
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Generation of the held lock this handle was issued against.
    pub fn generation(&self) -> u64 {
        self.ticket.generation
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Release this handle.
    ///
    /// Calling it again is a no-op. Errors only surface a failure to delete
    /// the lock file; the in-process share is given up regardless.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.shared.release(&self.canonical_path, self.ticket)
    }

    /// Give up the handle without releasing its share.
    ///
    /// The lock stays held until the watchdog expires it or every held lock
    /// is released at shutdown.
    pub fn detach(mut self) {
        self.released = true;
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(
                path = %self.lock_path.display(),
                error = %e,
                "failed to release session lock on drop"
            );
        }
    }
}

impl fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockHandle")
            .field("lock_path", &self.lock_path)
            .field("generation", &self.ticket.generation)
            .field("released", &self.released)
            .finish()
    }
}
