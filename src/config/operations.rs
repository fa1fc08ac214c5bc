//! Config loading, validation, and utility operations.

use super::model::LockConfig;
use crate::error::{LockError, Result};
use crate::locks::MaxHoldPolicy;
use std::path::Path;
use std::time::Duration;

impl LockConfig {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            LockError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: LockConfig = serde_yaml::from_str(yaml)
            .map_err(|e| LockError::Config(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| LockError::Config(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `stale_ms` must be positive
    /// - `retry_initial_ms` must be positive and not exceed `retry_max_ms`
    /// - `watchdog_interval_ms` must be positive
    /// - `grace_ratio` must be between 0 and 10
    pub fn validate(&self) -> Result<()> {
        if self.stale_ms == 0 {
            return Err(LockError::Config(
                "config validation failed: stale_ms must be greater than 0".to_string(),
            ));
        }

        if self.retry_initial_ms == 0 {
            return Err(LockError::Config(
                "config validation failed: retry_initial_ms must be greater than 0".to_string(),
            ));
        }

        if self.retry_initial_ms > self.retry_max_ms {
            return Err(LockError::Config(format!(
                "config validation failed: retry_initial_ms ({}) must not exceed retry_max_ms ({})",
                self.retry_initial_ms, self.retry_max_ms
            )));
        }

        if self.watchdog_interval_ms == 0 {
            return Err(LockError::Config(
                "config validation failed: watchdog_interval_ms must be greater than 0"
                    .to_string(),
            ));
        }

        if !(0.0..=10.0).contains(&self.grace_ratio) {
            return Err(LockError::Config(format!(
                "config validation failed: grace_ratio must be between 0 and 10 (found {})",
                self.grace_ratio
            )));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn stale(&self) -> Duration {
        Duration::from_millis(self.stale_ms)
    }

    pub fn max_hold(&self) -> Option<Duration> {
        self.max_hold_ms.map(Duration::from_millis)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    /// The grace constants used to derive a watchdog hold from a timeout.
    pub fn max_hold_policy(&self) -> MaxHoldPolicy {
        MaxHoldPolicy {
            grace_ratio: self.grace_ratio,
            grace_floor_ms: self.grace_floor_ms,
            timer_ceiling_ms: self.timer_ceiling_ms,
        }
    }
}
