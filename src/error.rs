//! Error types for the session lock manager.
//!
//! Only contention timeouts are surfaced as recoverable failures. Malformed
//! lock files, cleanup failures, and watchdog force-releases are logged and
//! never reach callers as errors.

use crate::exit_codes;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for lock operations.
#[derive(Error, Debug)]
pub enum LockError {
    /// The session file stayed locked by another holder until the timeout.
    #[error("session file locked (timeout {waited_ms}ms): {}{}", path.display(), describe_holder(*holder))]
    Timeout {
        path: PathBuf,
        waited_ms: u64,
        holder: Option<u32>,
    },

    /// A filesystem operation failed.
    #[error("{0}")]
    Io(String),

    /// The session path cannot be turned into a lock path.
    #[error("invalid session path: {0}")]
    InvalidPath(String),

    /// The configuration file is unreadable or invalid.
    #[error("{0}")]
    Config(String),

    /// The termination handler could not be installed.
    #[error("failed to set up termination handler: {0}")]
    Signal(String),
}

fn describe_holder(holder: Option<u32>) -> String {
    match holder {
        Some(pid) => format!(" (held by pid {})", pid),
        None => String::new(),
    }
}

impl LockError {
    /// Wrap an I/O error with the operation and path it failed on.
    pub fn io(action: &str, path: &Path, err: std::io::Error) -> Self {
        LockError::Io(format!("failed to {} '{}': {}", action, path.display(), err))
    }

    /// Whether the caller may reasonably retry (possibly with a longer timeout).
    pub fn is_retryable(&self) -> bool {
        matches!(self, LockError::Timeout { .. })
    }

    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LockError::Timeout { .. } => exit_codes::LOCK_FAILURE,
            LockError::Io(_) | LockError::Signal(_) => exit_codes::IO_FAILURE,
            LockError::InvalidPath(_) | LockError::Config(_) => exit_codes::USER_ERROR,
        }
    }
}

/// Result type alias for lock operations.
pub type Result<T> = std::result::Result<T, LockError>;
