//! Cross-process write locks for session files.
//!
//! # Lock Files
//!
//! A session file `s.jsonl` is locked by creating `s.jsonl.lock` next to it
//! with **create_new** semantics (exclusive create), so only one process can
//! hold a given lock at a time. Paths are resolved through symlinks first, so
//! every alias of a session file contends on the same lock file.
//!
//! # Lock Records
//!
//! Each lock file contains a JSON record:
//! - `pid`: process ID of the holder
//! - `createdAt`: RFC3339 timestamp
//! - `owner`: optional `user@HOST`, informational
//!
//! # Sharing Within a Process
//!
//! Acquisitions of a path this process already holds succeed immediately and
//! share the disk lock; the file is removed when the last [`LockHandle`] is
//! released. Handles are RAII guards: dropping one releases it.
//!
//! # Recovery
//!
//! Stale locks (dead holder, expired age, or malformed and old) are reclaimed
//! by the next claimant. A watchdog force-releases locks this process holds
//! past their maximum hold, and [`LockManager::scan_directory`] audits and
//! optionally cleans a whole sessions directory.

mod guard;
mod liveness;
mod manager;
mod max_hold;
mod record;
mod registry;
mod scan;
mod staleness;
mod watchdog;


pub use guard::LockHandle;
pub use liveness::{OsProcessProbe, ProcessProbe};
pub use manager::{AcquireOptions, LockManager, canonical_session_path, lock_path_for};
pub use max_hold::{MaxHoldPolicy, resolve_max_hold};
pub use record::{LockFileRecord, LockObservation, age_string};
pub use registry::HeldLock;
pub use scan::{ScanOptions, ScanReport, StaleLockEntry};
pub use staleness::{StaleReason, StaleVerdict, evaluate};
pub use watchdog::Watchdog;
