//! On-disk lock record and observation of existing lock files.

use crate::error::{LockError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Lock record stored in `<sessionFile>.lock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockFileRecord {
    /// Process ID of the lock holder.
    pub pid: u32,

    /// Timestamp when the lock was written (RFC3339).
    pub created_at: DateTime<Utc>,

    /// Owner of the lock (e.g., `user@HOST`), informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl LockFileRecord {
    /// Create a record for the current process with the current timestamp.
    pub fn new() -> Self {
        Self {
            pid: std::process::id(),
            created_at: Utc::now(),
            owner: Some(owner_tag()),
        }
    }

    /// Parse a record, rejecting payloads that could not identify a holder.
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let record: LockFileRecord = serde_json::from_str(content).map_err(|e| e.to_string())?;
        if record.pid == 0 {
            return Err("pid must be a positive integer".to_string());
        }
        Ok(record)
    }

    /// Serialize the record to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LockError::Io(format!("failed to serialize lock record: {}", e)))
    }

    /// Age of the record at `now`, never negative.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.created_at)
            .max(Duration::zero())
    }
}

/// A snapshot of an existing lock file.
#[derive(Debug, Clone)]
pub struct LockObservation {
    /// The parsed record, or `None` if the payload is malformed.
    pub record: Option<LockFileRecord>,

    /// File modification time, used to age malformed payloads.
    pub modified: Option<DateTime<Utc>>,
}

impl LockObservation {
    /// Read the lock file at `path`.
    ///
    /// Returns `Ok(None)` if the file does not exist (it may have been released
    /// between listing and reading).
    pub fn read(path: &Path) -> Result<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            // Non-UTF-8 bytes are a malformed payload, not an I/O failure
            Err(e) if e.kind() == ErrorKind::InvalidData => String::new(),
            Err(e) => return Err(LockError::io("read lock file", path, e)),
        };

        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        Ok(Some(Self {
            record: LockFileRecord::parse(&content).ok(),
            modified,
        }))
    }

    /// Recorded holder pid, if the payload parsed.
    pub fn pid(&self) -> Option<u32> {
        self.record.as_ref().map(|r| r.pid)
    }

    /// Age of the lock at `now`.
    ///
    /// Parsed records age from `createdAt`; malformed ones from the file's
    /// modification time. An unknown age counts as zero.
    pub fn age_at(&self, now: DateTime<Utc>) -> std::time::Duration {
        let age = match (&self.record, self.modified) {
            (Some(record), _) => record.age_at(now),
            (None, Some(modified)) => now.signed_duration_since(modified),
            (None, None) => Duration::zero(),
        };
        age.to_std().unwrap_or_default()
    }

    /// Whether two reads saw the same lock: the same record, or for a
    /// malformed payload, the same modification time.
    pub fn is_same_as(&self, other: &LockObservation) -> bool {
        match (&self.record, &other.record) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.modified.is_some() && self.modified == other.modified,
            _ => false,
        }
    }

    /// Whether this observation shows exactly `record` on disk.
    pub fn holds(&self, record: &LockFileRecord) -> bool {
        self.record.as_ref() == Some(record)
    }
}

/// Coarse age for listings: `45s`, `12m`, `3h 4m`, `2d 5h`.
pub fn age_string(age: std::time::Duration) -> String {
    let secs = age.as_secs();
    match (secs / 86_400, secs / 3_600 % 24, secs / 60 % 60) {
        (0, 0, 0) => format!("{secs}s"),
        (0, 0, mins) => format!("{mins}m"),
        (0, hours, mins) => format!("{hours}h {mins}m"),
        (days, hours, _) => format!("{days}d {hours}h"),
    }
}

fn owner_tag() -> String {
    let user = ["USER", "USERNAME"]
        .into_iter()
        .find_map(|key| std::env::var(key).ok());
    let host = hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().into_owned());

    format!(
        "{}@{}",
        user.as_deref().unwrap_or("unknown"),
        host.as_deref().unwrap_or("unknown")
    )
}
