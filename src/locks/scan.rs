//! Audit of lock files in a sessions directory.
//!
//! The scanner is the only component that inspects locks it does not hold.
//! It applies the same staleness rules as acquisition, and additionally
//! flags locks recorded under this process's pid that this process does not
//! track: they were left behind by an earlier lifecycle of the same daemon.

use super::manager::LockManager;
use super::record::{LockObservation, age_string};
use super::staleness::{self, StaleReason};
use crate::error::{LockError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// What to scan and how.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub sessions_dir: PathBuf,
    pub stale: Duration,
    /// Evaluation time; defaults to the current time.
    pub now: Option<DateTime<Utc>>,
    /// Delete every lock flagged stale.
    pub remove_stale: bool,
    /// Treat untracked locks recorded under this pid as orphans.
    pub own_pid: Option<u32>,
}

impl ScanOptions {
    pub fn new(sessions_dir: impl Into<PathBuf>, stale: Duration) -> Self {
        Self {
            sessions_dir: sessions_dir.into(),
            stale,
            now: None,
            remove_stale: false,
            own_pid: None,
        }
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn remove_stale(mut self, remove: bool) -> Self {
        self.remove_stale = remove;
        self
    }

    pub fn own_pid(mut self, pid: u32) -> Self {
        self.own_pid = Some(pid);
        self
    }
}

/// One lock file found by the scanner.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleLockEntry {
    pub lock_file_path: PathBuf,
    /// `None` when the payload is malformed.
    pub pid: Option<u32>,
    pub created_at: Option<DateTime<Utc>>,
    pub age_ms: u64,
    pub stale: bool,
    pub stale_reasons: BTreeSet<StaleReason>,
}

impl fmt::Display for StaleLockEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .lock_file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let pid = self
            .pid
            .map(|p| p.to_string())
            .unwrap_or_else(|| "?".to_string());
        write!(
            f,
            "{} (pid: {}, age: {}",
            name,
            pid,
            age_string(Duration::from_millis(self.age_ms))
        )?;
        if self.stale {
            let reasons: Vec<&str> = self.stale_reasons.iter().map(StaleReason::as_str).collect();
            write!(f, ", STALE: {}", reasons.join(", "))?;
        }
        write!(f, ")")
    }
}

/// Scanner output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// Every lock file found, sorted by path.
    pub locks: Vec<StaleLockEntry>,
    /// Entries that were deleted.
    pub cleaned: Vec<StaleLockEntry>,
}

impl ScanReport {
    pub fn stale_count(&self) -> usize {
        self.locks.iter().filter(|l| l.stale).count()
    }
}

impl LockManager {
    /// Inspect every `*.lock` file in `options.sessions_dir`.
    ///
    /// A missing directory yields an empty report. Locks this manager holds
    /// under `own_pid` are never flagged or removed. Deletion failures are
    /// logged and skipped.
    pub fn scan_directory(&self, options: &ScanOptions) -> Result<ScanReport> {
        let mut report = ScanReport::default();
        let now = options.now.unwrap_or_else(Utc::now);

        let dir = match fs::canonicalize(&options.sessions_dir) {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(LockError::io("resolve sessions directory", &options.sessions_dir, e)),
        };

        let entries = fs::read_dir(&dir).map_err(|e| LockError::io("read sessions directory", &dir, e))?;

        let mut lock_paths = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            let path = entry.path();
            let is_lock = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".lock"));
            if is_lock && entry.file_type().is_ok_and(|t| t.is_file()) {
                lock_paths.push(path);
            }
        }
        lock_paths.sort();

        for path in lock_paths {
            let observation = match LockObservation::read(&path) {
                Ok(Some(observation)) => observation,
                Ok(None) => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable lock file");
                    continue;
                }
            };

            let age = observation.age_at(now);
            let mut verdict = staleness::evaluate(
                observation.record.as_ref(),
                age,
                options.stale,
                self.shared.probe(),
            );

            if let (Some(own_pid), Some(pid)) = (options.own_pid, observation.pid())
                && own_pid == pid
            {
                if self.shared.registry().tracks_lock_file(&path) {
                    verdict.reasons.clear();
                } else {
                    verdict.reasons.insert(StaleReason::OrphanedOwnPid);
                }
            }

            let entry = StaleLockEntry {
                lock_file_path: path,
                pid: observation.pid(),
                created_at: observation.record.as_ref().map(|r| r.created_at),
                age_ms: age.as_millis() as u64,
                stale: verdict.is_stale(),
                stale_reasons: verdict.reasons,
            };

            if entry.stale && options.remove_stale {
                match remove_if_unchanged(&entry.lock_file_path, &observation) {
                    Ok(true) => {
                        info!(
                            path = %entry.lock_file_path.display(),
                            pid = ?entry.pid,
                            reasons = ?entry.stale_reasons,
                            "removed stale session lock"
                        );
                        report.cleaned.push(entry.clone());
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(path = %entry.lock_file_path.display(), error = %e, "failed to remove stale session lock");
                    }
                }
            }

            report.locks.push(entry);
        }

        Ok(report)
    }
}

/// Delete `path` only if it still shows exactly what was `observed`.
///
/// Returns whether the file was removed. A lock that was reclaimed, released,
/// or recreated since it was classified is left in place.
pub(crate) fn remove_if_unchanged(path: &Path, observed: &LockObservation) -> Result<bool> {
    let Some(current) = LockObservation::read(path)? else {
        return Ok(false);
    };

    if !current.is_same_as(observed) {
        warn!(
            path = %path.display(),
            holder = ?current.pid(),
            "lock file changed since it was classified; leaving it in place"
        );
        return Ok(false);
    }

    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(LockError::io("remove stale lock file", path, e)),
    }
}
