//! Lock acquisition and release.
//!
//! # Acquisition
//!
//! 1. Resolve the session path through symlinks so every alias shares a lock.
//! 2. If this process already holds it, add a handle and return at once.
//! 3. Otherwise create `<session>.lock` exclusively.
//! 4. If it exists, evaluate it; reclaim it if stale, else back off and retry
//!    until the timeout.
//!
//! The registry mutex is held across each attempt so two threads of this
//! process never both create (or both reclaim) the same lock file.

use super::guard::LockHandle;
use super::liveness::{OsProcessProbe, ProcessProbe};
use super::record::{LockFileRecord, LockObservation};
use super::registry::{HeldLock, Registry, ReleaseOutcome, Ticket};
use super::staleness;
use crate::config::LockConfig;
use crate::error::{LockError, Result};
use crate::fs::{atomic_write, create_exclusive};
use chrono::Utc;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Per-call overrides for [`LockManager::acquire`].
///
/// Unset fields fall back to the manager's [`LockConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AcquireOptions {
    pub timeout: Option<Duration>,
    pub stale: Option<Duration>,
    pub max_hold: Option<Duration>,
}

impl AcquireOptions {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn stale(mut self, stale: Duration) -> Self {
        self.stale = Some(stale);
        self
    }

    pub fn max_hold(mut self, max_hold: Duration) -> Self {
        self.max_hold = Some(max_hold);
        self
    }
}

/// State shared between the manager, its handles, and background workers.
pub(crate) struct Shared {
    registry: Mutex<Registry>,
    probe: Arc<dyn ProcessProbe>,
    config: LockConfig,
}

/// Outcome of inspecting a contended lock file.
enum Contention {
    /// The lock file disappeared; try to create it again right away.
    Vanished,
    /// The lock is legitimately held.
    Held(Option<u32>),
    /// The stale lock now carries our record.
    Reclaimed,
}

impl Shared {
    pub(crate) fn registry(&self) -> MutexGuard<'_, Registry> {
        // A panic while holding the registry must not wedge every later caller
        self.registry.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    pub(crate) fn probe(&self) -> &dyn ProcessProbe {
        self.probe.as_ref()
    }

    pub(crate) fn release(&self, canonical: &Path, ticket: Ticket) -> Result<()> {
        let mut registry = self.registry();
        match registry.release(canonical, ticket) {
            ReleaseOutcome::Ignored => {
                debug!(
                    path = %canonical.display(),
                    generation = ticket.generation,
                    "release ignored for handle of an expired or released lock"
                );
                Ok(())
            }
            ReleaseOutcome::Remaining(count) => {
                debug!(path = %canonical.display(), remaining = count, "released session lock handle");
                Ok(())
            }
            ReleaseOutcome::Last(held) => {
                remove_owned_lock_file(&held)?;
                debug!(path = %held.lock_path.display(), "released session lock");
                Ok(())
            }
        }
    }
}

/// Delete a held lock's file if it still carries the record we wrote.
///
/// Returns whether a file was removed. A lock file rewritten by another
/// process (after reclaiming ours) is left in place.
pub(crate) fn remove_owned_lock_file(held: &HeldLock) -> Result<bool> {
    let Some(observation) = LockObservation::read(&held.lock_path)? else {
        debug!(path = %held.lock_path.display(), "lock file already removed");
        return Ok(false);
    };

    if !observation.holds(&held.record) {
        warn!(
            path = %held.lock_path.display(),
            holder = ?observation.pid(),
            "lock file now belongs to another holder; leaving it in place"
        );
        return Ok(false);
    }

    match fs::remove_file(&held.lock_path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(LockError::io("remove lock file", &held.lock_path, e)),
    }
}

/// Cross-process lock manager for session files.
///
/// Cloning is cheap; clones share one registry. Independent managers do not
/// share state with each other, even inside one process.
#[derive(Clone)]
pub struct LockManager {
    pub(crate) shared: Arc<Shared>,
}

impl LockManager {
    /// Create a manager that probes liveness through the operating system.
    pub fn new(config: LockConfig) -> Self {
        Self::with_probe(config, Arc::new(OsProcessProbe))
    }

    pub fn with_probe(config: LockConfig, probe: Arc<dyn ProcessProbe>) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::default()),
                probe,
                config,
            }),
        }
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn config(&self) -> &LockConfig {
        &self.shared.config
    }

    /// Acquire the write lock for `session_file`.
    ///
    /// Fails with [`LockError::Timeout`] if another holder keeps the lock for
    /// the whole timeout; the contended lock file is left untouched.
    pub fn acquire(&self, session_file: &Path, options: AcquireOptions) -> Result<LockHandle> {
        let config = &self.shared.config;
        let timeout = options.timeout.unwrap_or_else(|| config.timeout());
        let stale = options.stale.unwrap_or_else(|| config.stale());
        let max_hold = options.max_hold.or_else(|| config.max_hold());
        let retry_max = Duration::from_millis(config.retry_max_ms);

        let canonical = canonical_session_path(session_file)?;
        let lock_path = lock_path_for(&canonical);

        let start = Instant::now();
        let mut delay = Duration::from_millis(config.retry_initial_ms);
        let mut holder = None;

        loop {
            if let Some(ticket) = self.try_acquire(&canonical, &lock_path, stale, max_hold, &mut holder)? {
                return Ok(LockHandle::new(
                    Arc::clone(&self.shared),
                    canonical,
                    lock_path,
                    ticket,
                ));
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                debug!(path = %lock_path.display(), holder = ?holder, "timed out waiting for session lock");
                return Err(LockError::Timeout {
                    path: canonical,
                    waited_ms: elapsed.as_millis() as u64,
                    holder,
                });
            }

            thread::sleep(delay.min(timeout - elapsed));
            delay = (delay * 2).min(retry_max);
        }
    }

    /// One attempt under the registry lock. `Ok(None)` means contended.
    fn try_acquire(
        &self,
        canonical: &Path,
        lock_path: &Path,
        stale: Duration,
        max_hold: Option<Duration>,
        holder: &mut Option<u32>,
    ) -> Result<Option<Ticket>> {
        // Built before taking the registry so joins on other paths never wait on it
        let record = LockFileRecord::new();
        let payload = record.to_json()?;

        let mut registry = self.shared.registry();

        if let Some(ticket) = registry.join(canonical, max_hold) {
            debug!(path = %lock_path.display(), generation = ticket.generation, "joined session lock held by this process");
            return Ok(Some(ticket));
        }

        // A lock file that vanishes mid-inspection is retried at once, a bounded number of times
        for _ in 0..3 {
            if create_exclusive(lock_path, payload.as_bytes())? {
                let ticket = registry.insert(canonical.to_path_buf(), lock_path.to_path_buf(), record, max_hold);
                debug!(path = %lock_path.display(), generation = ticket.generation, "acquired session lock");
                return Ok(Some(ticket));
            }

            match self.inspect_contended(lock_path, stale, &record, &payload)? {
                Contention::Vanished => continue,
                Contention::Held(pid) => {
                    *holder = pid;
                    return Ok(None);
                }
                Contention::Reclaimed => {
                    let ticket = registry.insert(canonical.to_path_buf(), lock_path.to_path_buf(), record, max_hold);
                    return Ok(Some(ticket));
                }
            }
        }

        Ok(None)
    }

    /// Evaluate an existing lock file and reclaim it if it is stale.
    fn inspect_contended(
        &self,
        lock_path: &Path,
        stale: Duration,
        record: &LockFileRecord,
        payload: &str,
    ) -> Result<Contention> {
        let Some(observation) = LockObservation::read(lock_path)? else {
            return Ok(Contention::Vanished);
        };

        let age = observation.age_at(Utc::now());
        let verdict = staleness::evaluate(
            observation.record.as_ref(),
            age,
            stale,
            self.shared.probe(),
        );
        if !verdict.is_stale() {
            return Ok(Contention::Held(observation.pid()));
        }

        // Another claimant may have reclaimed it since we read it
        match LockObservation::read(lock_path)? {
            None => return Ok(Contention::Vanished),
            Some(current) if current.record != observation.record => {
                return Ok(Contention::Held(current.pid()));
            }
            Some(_) => {}
        }

        atomic_write(lock_path, payload.as_bytes())?;

        // Two reclaimers can both rename; only the one whose record survived holds the lock
        match LockObservation::read(lock_path)? {
            Some(current) if current.holds(record) => {
                info!(
                    path = %lock_path.display(),
                    previous_pid = ?observation.pid(),
                    age_ms = age.as_millis() as u64,
                    reasons = %verdict.describe(),
                    "reclaimed stale session lock"
                );
                Ok(Contention::Reclaimed)
            }
            Some(current) => Ok(Contention::Held(current.pid())),
            None => Ok(Contention::Vanished),
        }
    }

    /// Release every lock this manager holds, deleting their lock files.
    ///
    /// Outstanding handles become no-ops. Returns the number of locks released.
    pub fn release_all_held_locks(&self) -> usize {
        let drained = self.shared.registry().drain();
        for held in &drained {
            if let Err(e) = remove_owned_lock_file(held) {
                warn!(path = %held.lock_path.display(), error = %e, "failed to remove lock file during release-all");
            }
        }
        if !drained.is_empty() {
            info!(count = drained.len(), "released all held session locks");
        }
        drained.len()
    }

    /// A shutdown hook that releases every held lock.
    ///
    /// The hook does not keep the manager alive.
    pub fn shutdown_hook(&self) -> impl Fn() + Send + Sync + 'static {
        let shared = Arc::downgrade(&self.shared);
        move || {
            if let Some(shared) = shared.upgrade() {
                LockManager::from_shared(shared).release_all_held_locks();
            }
        }
    }

    /// Whether this manager currently holds the lock for `session_file`.
    pub fn is_held(&self, session_file: &Path) -> bool {
        self.held_lock(session_file).is_some()
    }

    /// Snapshot of the held lock for `session_file`, if any.
    pub fn held_lock(&self, session_file: &Path) -> Option<HeldLock> {
        let canonical = resolve_existing(session_file)?;
        self.shared.registry().get(&canonical).cloned()
    }

    /// Number of distinct session files currently held.
    pub fn held_count(&self) -> usize {
        self.shared.registry().len()
    }
}

/// Symlink hops followed before giving up, matching the usual `ELOOP` limit.
const MAX_SYMLINK_HOPS: usize = 40;

/// Resolve symlinks so aliases of one session file map to one path.
///
/// The containing directory is resolved, then a symlink at the file name is
/// followed even when its target does not exist yet, so the result never
/// depends on whether the transcript has been written. Missing directories
/// are created.
pub fn canonical_session_path(session_file: &Path) -> Result<PathBuf> {
    resolve_session_path(session_file, true)
}

/// Canonical path without creating anything; `None` if it cannot be resolved.
fn resolve_existing(session_file: &Path) -> Option<PathBuf> {
    resolve_session_path(session_file, false).ok()
}

fn resolve_session_path(session_file: &Path, create_dirs: bool) -> Result<PathBuf> {
    let mut path = session_file.to_path_buf();

    for _ in 0..MAX_SYMLINK_HOPS {
        let file_name = path
            .file_name()
            .ok_or_else(|| LockError::InvalidPath(session_file.display().to_string()))?
            .to_os_string();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        if create_dirs {
            fs::create_dir_all(&parent)
                .map_err(|e| LockError::io("create session directory", &parent, e))?;
        }
        let real_parent = fs::canonicalize(&parent)
            .map_err(|e| LockError::io("resolve session directory", &parent, e))?;
        let candidate = real_parent.join(&file_name);

        match fs::symlink_metadata(&candidate) {
            Ok(meta) if meta.file_type().is_symlink() => {
                let target = fs::read_link(&candidate)
                    .map_err(|e| LockError::io("read session symlink", &candidate, e))?;
                // Relative targets resolve against the link's directory; absolute ones replace it
                path = real_parent.join(target);
            }
            _ => return Ok(candidate),
        }
    }

    Err(LockError::InvalidPath(format!(
        "{}: too many levels of symbolic links",
        session_file.display()
    )))
}

/// `<session file>.lock`, next to the session file.
pub fn lock_path_for(session_path: &Path) -> PathBuf {
    let mut name = OsString::from(session_path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}
