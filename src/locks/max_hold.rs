//! Watchdog hold derived from a caller's timeout.

/// Constants for turning an operation timeout into a maximum lock hold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxHoldPolicy {
    /// Fraction of the timeout added as grace.
    pub grace_ratio: f64,
    /// Minimum grace in milliseconds.
    pub grace_floor_ms: u64,
    /// Timeouts at or above this are "no timeout" sentinels.
    pub timer_ceiling_ms: u64,
}

impl Default for MaxHoldPolicy {
    fn default() -> Self {
        Self {
            grace_ratio: 0.2,
            grace_floor_ms: 120_000,
            timer_ceiling_ms: i32::MAX as u64,
        }
    }
}

impl MaxHoldPolicy {
    /// Maximum hold for a lock taken by an operation bounded by `timeout_ms`.
    ///
    /// The hold is `timeout + max(timeout * ratio, floor)`, raised to `min_ms`.
    /// A timeout at the ceiling is returned unchanged, and the sum never
    /// exceeds the ceiling.
    pub fn resolve_max_hold(&self, timeout_ms: u64, min_ms: Option<u64>) -> u64 {
        if timeout_ms >= self.timer_ceiling_ms {
            return timeout_ms;
        }

        let proportional = (timeout_ms as f64 * self.grace_ratio).floor();
        let proportional = if proportional.is_finite() && proportional > 0.0 {
            proportional as u64
        } else {
            0
        };
        let grace = proportional.max(self.grace_floor_ms);
        let candidate = timeout_ms
            .saturating_add(grace)
            .min(self.timer_ceiling_ms);

        candidate.max(min_ms.unwrap_or(0))
    }
}

/// [`MaxHoldPolicy::resolve_max_hold`] with the default constants.
pub fn resolve_max_hold(timeout_ms: u64, min_ms: Option<u64>) -> u64 {
    MaxHoldPolicy::default().resolve_max_hold(timeout_ms, min_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proportional_grace_for_long_timeouts() {
        assert_eq!(resolve_max_hold(600_000, None), 720_000);
        assert_eq!(resolve_max_hold(1_000_000, None), 1_200_000);
    }

    #[test]
    fn floor_grace_for_short_timeouts() {
        assert_eq!(resolve_max_hold(1_000, None), 121_000);
        assert_eq!(resolve_max_hold(0, None), 120_000);
    }

    #[test]
    fn min_only_raises_the_result() {
        assert_eq!(resolve_max_hold(1_000, Some(5_000)), 121_000);
        assert_eq!(resolve_max_hold(1_000, Some(500_000)), 500_000);
    }

    #[test]
    fn ceiling_timeout_is_unchanged() {
        let ceiling = i32::MAX as u64;
        assert_eq!(resolve_max_hold(ceiling, None), ceiling);
        assert_eq!(resolve_max_hold(u64::MAX, None), u64::MAX);
    }

    #[test]
    fn near_ceiling_is_clamped() {
        let ceiling = i32::MAX as u64;
        assert_eq!(resolve_max_hold(ceiling - 1, None), ceiling);
    }

    #[test]
    fn custom_policy_constants() {
        let policy = MaxHoldPolicy {
            grace_ratio: 0.5,
            grace_floor_ms: 10,
            timer_ceiling_ms: 1_000_000,
        };
        assert_eq!(policy.resolve_max_hold(100, None), 150);
        assert_eq!(policy.resolve_max_hold(10, None), 20);
        assert_eq!(policy.resolve_max_hold(1_000_000, None), 1_000_000);
    }
}
