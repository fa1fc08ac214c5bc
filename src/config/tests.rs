//! Tests for config functionality.

use crate::config::LockConfig;
use std::time::Duration;

#[test]
fn test_default_config() {
    let config = LockConfig::default();

    assert_eq!(config.timeout_ms, 10_000);
    assert_eq!(config.stale_ms, 1_800_000);
    assert_eq!(config.max_hold_ms, Some(300_000));
    assert_eq!(config.retry_initial_ms, 25);
    assert_eq!(config.retry_max_ms, 1_000);
    assert_eq!(config.watchdog_interval_ms, 60_000);
    assert_eq!(config.grace_ratio, 0.2);
    assert_eq!(config.grace_floor_ms, 120_000);
    assert_eq!(config.timer_ceiling_ms, 2_147_483_647);
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_minimal_yaml() {
    let config = LockConfig::from_yaml("").unwrap();
    assert_eq!(config, LockConfig::default());
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
timeout_ms: 500
stale_ms: 2000
"#;
    let config = LockConfig::from_yaml(yaml).unwrap();

    assert_eq!(config.timeout_ms, 500);
    assert_eq!(config.stale_ms, 2000);

    // Unspecified values should use defaults
    assert_eq!(config.retry_max_ms, 1_000);
    assert_eq!(config.max_hold_ms, Some(300_000));
}

#[test]
fn test_parse_null_max_hold_disables_default() {
    let config = LockConfig::from_yaml("max_hold_ms: null\n").unwrap();
    assert_eq!(config.max_hold_ms, None);
    assert_eq!(config.max_hold(), None);
}

#[test]
fn test_unknown_fields_are_ignored() {
    let yaml = r#"
timeout_ms: 750
future_option: true
"#;
    let config = LockConfig::from_yaml(yaml).unwrap();
    assert_eq!(config.timeout_ms, 750);
}

#[test]
fn test_validation_rejects_zero_stale() {
    let err = LockConfig::from_yaml("stale_ms: 0\n").unwrap_err();
    assert!(err.to_string().contains("stale_ms must be greater than 0"));
}

#[test]
fn test_validation_rejects_inverted_retry_bounds() {
    let yaml = r#"
retry_initial_ms: 500
retry_max_ms: 100
"#;
    let err = LockConfig::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("must not exceed retry_max_ms"));
}

#[test]
fn test_validation_rejects_negative_grace_ratio() {
    let err = LockConfig::from_yaml("grace_ratio: -0.5\n").unwrap_err();
    assert!(err.to_string().contains("grace_ratio"));
}

#[test]
fn test_invalid_yaml_is_config_error() {
    let err = LockConfig::from_yaml("timeout_ms: [not, a, number]\n").unwrap_err();
    assert!(err.to_string().contains("failed to parse config YAML"));
}

#[test]
fn test_yaml_roundtrip_preserves_values() {
    let config = LockConfig {
        timeout_ms: 1234,
        max_hold_ms: None,
        ..LockConfig::default()
    };
    let yaml = config.to_yaml().unwrap();
    let parsed = LockConfig::from_yaml(&yaml).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("session-lock.yaml");
    std::fs::write(&path, "timeout_ms: 42\n").unwrap();

    let config = LockConfig::load(&path).unwrap();
    assert_eq!(config.timeout(), Duration::from_millis(42));
}

#[test]
fn test_load_missing_file_fails() {
    let dir = tempfile::TempDir::new().unwrap();
    let err = LockConfig::load(dir.path().join("nope.yaml")).unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
}

#[test]
fn test_max_hold_policy_mirrors_grace_fields() {
    let config = LockConfig {
        grace_ratio: 0.5,
        grace_floor_ms: 10,
        timer_ceiling_ms: 1_000_000,
        ..LockConfig::default()
    };
    let policy = config.max_hold_policy();
    assert_eq!(policy.grace_ratio, 0.5);
    assert_eq!(policy.grace_floor_ms, 10);
    assert_eq!(policy.timer_ceiling_ms, 1_000_000);
}
