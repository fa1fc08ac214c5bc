//! In-process table of held locks.
//!
//! Every acquisition of a canonical session path inside one process shares a
//! single [`HeldLock`]. Each `HeldLock` carries a generation number that is
//! never reused, so a handle issued against a lock that has since been force
//! released cannot touch a newer lock on the same path.

use super::record::LockFileRecord;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Identifies one handle issued against one generation of a held lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket {
    pub generation: u64,
    pub handle_id: u64,
}

/// A disk-level lock owned by this process.
#[derive(Debug, Clone)]
pub struct HeldLock {
    pub canonical_path: PathBuf,
    pub lock_path: PathBuf,
    pub ref_count: usize,
    pub acquired_at: DateTime<Utc>,
    pub max_hold: Option<Duration>,
    pub generation: u64,
    pub holders: HashSet<u64>,
    /// The record this process wrote; deletion only proceeds if it is still on disk.
    pub record: LockFileRecord,
}

impl HeldLock {
    /// Whether the lock has been held past its maximum at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let Some(max_hold) = self.max_hold else {
            return false;
        };
        match chrono::Duration::from_std(max_hold) {
            Ok(max_hold) => self
                .acquired_at
                .checked_add_signed(max_hold)
                .is_some_and(|deadline| deadline < now),
            // Too large to represent: never expires
            Err(_) => false,
        }
    }
}

/// Result of releasing one handle.
#[derive(Debug)]
pub(crate) enum ReleaseOutcome {
    /// The handle's generation is gone or the handle was already released.
    Ignored,
    /// Other handles still hold the lock.
    Remaining(usize),
    /// This was the last handle; the lock has left the registry.
    Last(HeldLock),
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    held: HashMap<PathBuf, HeldLock>,
    next_generation: u64,
    next_handle: u64,
}

impl Registry {
    fn issue_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Add a handle to an already held lock, if there is one.
    pub fn join(&mut self, canonical: &Path, max_hold: Option<Duration>) -> Option<Ticket> {
        let handle_id = self.next_handle + 1;
        let held = self.held.get_mut(canonical)?;
        self.next_handle = handle_id;

        held.ref_count += 1;
        held.holders.insert(handle_id);
        held.max_hold = match (held.max_hold, max_hold) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        Some(Ticket {
            generation: held.generation,
            handle_id,
        })
    }

    /// Track a freshly created disk lock with a single handle.
    pub fn insert(
        &mut self,
        canonical_path: PathBuf,
        lock_path: PathBuf,
        record: LockFileRecord,
        max_hold: Option<Duration>,
    ) -> Ticket {
        self.next_generation += 1;
        let generation = self.next_generation;
        let handle_id = self.issue_handle();

        let held = HeldLock {
            canonical_path: canonical_path.clone(),
            lock_path,
            ref_count: 1,
            acquired_at: record.created_at,
            max_hold,
            generation,
            holders: HashSet::from([handle_id]),
            record,
        };
        self.held.insert(canonical_path, held);

        Ticket {
            generation,
            handle_id,
        }
    }

    pub fn release(&mut self, canonical: &Path, ticket: Ticket) -> ReleaseOutcome {
        let Some(held) = self.held.get_mut(canonical) else {
            return ReleaseOutcome::Ignored;
        };
        if held.generation != ticket.generation || !held.holders.remove(&ticket.handle_id) {
            return ReleaseOutcome::Ignored;
        }

        held.ref_count -= 1;
        if held.ref_count > 0 {
            return ReleaseOutcome::Remaining(held.ref_count);
        }

        match self.held.remove(canonical) {
            Some(held) => ReleaseOutcome::Last(held),
            None => ReleaseOutcome::Ignored,
        }
    }

    /// Remove and return every lock held past its maximum at `now`.
    pub fn take_expired(&mut self, now: DateTime<Utc>) -> Vec<HeldLock> {
        let expired: Vec<PathBuf> = self
            .held
            .iter()
            .filter(|(_, held)| held.is_expired_at(now))
            .map(|(path, _)| path.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|path| self.held.remove(&path))
            .collect()
    }

    /// Remove and return every held lock.
    pub fn drain(&mut self) -> Vec<HeldLock> {
        self.held.drain().map(|(_, held)| held).collect()
    }

    pub fn get(&self, canonical: &Path) -> Option<&HeldLock> {
        self.held.get(canonical)
    }

    pub fn tracks_lock_file(&self, lock_path: &Path) -> bool {
        self.held.values().any(|held| held.lock_path == lock_path)
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }
}
