//! Staleness decisions for existing lock files.
//!
//! The acquisition engine and the directory scanner both call [`evaluate`];
//! neither has its own notion of "stale".

use super::liveness::ProcessProbe;
use super::record::LockFileRecord;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// Why a lock file may be reclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StaleReason {
    /// The recorded holder process is not running.
    DeadPid,
    /// The holder is alive but the lock outlived the stale threshold.
    ExpiredAge,
    /// The payload is unparseable and older than the stale threshold.
    Malformed,
    /// The lock names this process but this process does not track it.
    OrphanedOwnPid,
}

impl StaleReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaleReason::DeadPid => "dead-pid",
            StaleReason::ExpiredAge => "expired-age",
            StaleReason::Malformed => "malformed",
            StaleReason::OrphanedOwnPid => "orphaned-own-pid",
        }
    }
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a staleness evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaleVerdict {
    pub reasons: BTreeSet<StaleReason>,
}

impl StaleVerdict {
    pub fn is_stale(&self) -> bool {
        !self.reasons.is_empty()
    }

    pub fn with(mut self, reason: StaleReason) -> Self {
        self.reasons.insert(reason);
        self
    }

    /// Comma-separated reason tags, for log fields.
    pub fn describe(&self) -> String {
        self.reasons
            .iter()
            .map(StaleReason::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Decide whether a lock file may be reclaimed.
///
/// - malformed payloads are left alone until they are `stale` old, so a holder
///   caught between create and write is not robbed
/// - a parsed record whose pid is not running is stale at any age
/// - a live holder is stale once the lock is `stale` old
pub fn evaluate(
    record: Option<&LockFileRecord>,
    age: Duration,
    stale: Duration,
    probe: &dyn ProcessProbe,
) -> StaleVerdict {
    let verdict = StaleVerdict::default();
    let expired = age >= stale;

    match record {
        None if expired => verdict.with(StaleReason::Malformed),
        None => verdict,
        Some(record) if !probe.is_process_alive(record.pid) => verdict.with(StaleReason::DeadPid),
        Some(_) if expired => verdict.with(StaleReason::ExpiredAge),
        Some(_) => verdict,
    }
}
