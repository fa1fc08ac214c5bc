//! LockConfig struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for the session lock manager.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    // =========================================================================
    // Acquisition settings
    // =========================================================================
    /// Default time to wait for a contended lock before giving up.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Age after which an existing lock file may be reclaimed.
    #[serde(default = "default_stale_ms")]
    pub stale_ms: u64,

    /// First retry delay while a lock is contended.
    #[serde(default = "default_retry_initial_ms")]
    pub retry_initial_ms: u64,

    /// Upper bound for the doubling retry delay.
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,

    // =========================================================================
    // Watchdog settings
    // =========================================================================
    /// Default maximum hold for acquisitions that do not request one.
    /// `null` leaves such locks out of the watchdog sweep.
    #[serde(default = "default_max_hold_ms")]
    pub max_hold_ms: Option<u64>,

    /// How often the background watchdog sweeps held locks.
    #[serde(default = "default_watchdog_interval_ms")]
    pub watchdog_interval_ms: u64,

    // =========================================================================
    // Max-hold grace settings
    // =========================================================================
    /// Fraction of the caller's timeout added as grace.
    #[serde(default = "default_grace_ratio")]
    pub grace_ratio: f64,

    /// Minimum grace added to the caller's timeout.
    #[serde(default = "default_grace_floor_ms")]
    pub grace_floor_ms: u64,

    /// Timeouts at or above this value mean "no timeout" and get no grace.
    #[serde(default = "default_timer_ceiling_ms")]
    pub timer_ceiling_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            stale_ms: default_stale_ms(),
            retry_initial_ms: default_retry_initial_ms(),
            retry_max_ms: default_retry_max_ms(),
            max_hold_ms: default_max_hold_ms(),
            watchdog_interval_ms: default_watchdog_interval_ms(),
            grace_ratio: default_grace_ratio(),
            grace_floor_ms: default_grace_floor_ms(),
            timer_ceiling_ms: default_timer_ceiling_ms(),
        }
    }
}
