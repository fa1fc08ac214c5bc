//! Default values for `LockConfig` fields.

// Default value functions for serde
pub(crate) fn default_timeout_ms() -> u64 {
    10_000
}
pub(crate) fn default_stale_ms() -> u64 {
    30 * 60 * 1000
}
pub(crate) fn default_max_hold_ms() -> Option<u64> {
    Some(5 * 60 * 1000)
}
pub(crate) fn default_retry_initial_ms() -> u64 {
    25
}
pub(crate) fn default_retry_max_ms() -> u64 {
    1_000
}
pub(crate) fn default_watchdog_interval_ms() -> u64 {
    60_000
}
pub(crate) fn default_grace_ratio() -> f64 {
    0.2
}
pub(crate) fn default_grace_floor_ms() -> u64 {
    120_000
}
/// Largest delay a signed 32-bit millisecond timer can represent.
pub(crate) fn default_timer_ceiling_ms() -> u64 {
    i32::MAX as u64
}
