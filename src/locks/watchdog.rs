//! Force-release of locks held past their maximum hold.

use super::manager::{LockManager, remove_owned_lock_file};
use crate::error::{LockError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

impl LockManager {
    /// Force-release every lock held longer than its maximum hold at `now`.
    ///
    /// Handles issued against a force-released lock become no-ops. Returns the
    /// number of locks released.
    pub fn run_watchdog_check(&self, now: DateTime<Utc>) -> usize {
        let expired = self.shared.registry().take_expired(now);

        for held in &expired {
            let held_for = now.signed_duration_since(held.acquired_at);
            warn!(
                path = %held.lock_path.display(),
                generation = held.generation,
                holders = held.ref_count,
                held_ms = held_for.num_milliseconds(),
                max_hold_ms = held.max_hold.map(|d| d.as_millis() as u64),
                "watchdog force-releasing session lock held past its maximum"
            );
            if let Err(e) = remove_owned_lock_file(held) {
                warn!(path = %held.lock_path.display(), error = %e, "watchdog failed to remove lock file");
            }
        }

        expired.len()
    }

    /// Run [`run_watchdog_check`](Self::run_watchdog_check) on a background
    /// thread every `watchdog_interval_ms`.
    ///
    /// The thread stops when the returned [`Watchdog`] is stopped or dropped,
    /// or when the manager is gone.
    pub fn start_watchdog(&self) -> Result<Watchdog> {
        self.start_watchdog_every(self.config().watchdog_interval())
    }

    pub fn start_watchdog_every(&self, interval: Duration) -> Result<Watchdog> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let shared = Arc::downgrade(&self.shared);

        let thread = thread::Builder::new()
            .name("session-lock-watchdog".to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    let Some(shared) = shared.upgrade() else {
                        break;
                    };
                    let released = LockManager::from_shared(shared).run_watchdog_check(Utc::now());
                    if released > 0 {
                        debug!(released, "watchdog sweep finished");
                    }
                }
            })
            .map_err(|e| LockError::Io(format!("failed to spawn watchdog thread: {}", e)))?;

        Ok(Watchdog {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

/// Handle to the background watchdog thread.
#[derive(Debug)]
pub struct Watchdog {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Stop the sweep and wait for the thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.shutdown();
    }
}
