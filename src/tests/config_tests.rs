//! Cross-cutting tests for configuration loading, layering, and validation.

use crate::config::{ConfigLoader, PipelineConfig, Validate};
use crate::error::config::ConfigError;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_default_config_is_valid() {
    let config = PipelineConfig::default();
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_validation_catches_empty_handler_pool() {
    let mut config = PipelineConfig::default();
    config.base_preparation_handlers = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_catches_zero_emitters() {
    let mut config = PipelineConfig::default();
    config.regular_emitter_count = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_validation_catches_bad_log_level() {
    let mut config = PipelineConfig::default();
    config.log.level = "verbose".to_string();
    assert!(config.validate().is_err());
}

/// A missing configuration file is not an error: the loader writes the
/// defaults out and proceeds with them.
#[test]
fn test_missing_config_file_writes_defaults() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    assert!(!config_path.exists());

    let loader = ConfigLoader::new(Some(&config_path), "TEST_MISSING");
    let config = loader.load().unwrap();

    assert!(config_path.exists());
    assert_eq!(
        config.simulation_duration_seconds,
        PipelineConfig::default().simulation_duration_seconds
    );
}

#[test]
fn test_load_config_from_file() {
    std::env::remove_var("TEST_FILE__SIMULATION_DURATION_SECONDS");

    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config_file_test.json");

    let defaults = PipelineConfig::default();
    let mut json: serde_json::Value = serde_json::to_value(&defaults).unwrap();
    json["SimulationDurationSeconds"] = serde_json::json!(60);
    json["RegularEmitterCount"] = serde_json::json!(5);
    fs::write(&config_path, serde_json::to_string_pretty(&json).unwrap()).unwrap();

    let loader = ConfigLoader::new(Some(&config_path), "TEST_FILE");
    let config = loader.load().unwrap();

    assert_eq!(config.simulation_duration_seconds, 60);
    assert_eq!(config.regular_emitter_count, 5);
    // Untouched fields fall back to defaults.
    assert_eq!(config.group_emitter_count, defaults.group_emitter_count);
}

#[test]
fn test_env_var_override() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config_env_test.json");
    let defaults = PipelineConfig::default();
    fs::write(
        &config_path,
        serde_json::to_string_pretty(&defaults).unwrap(),
    )
    .unwrap();

    std::env::set_var("TEST_ENV__SIMULATION_DURATION_SECONDS", "42");
    let loader = ConfigLoader::new(Some(&config_path), "TEST_ENV");
    let config = loader.load().unwrap();
    std::env::remove_var("TEST_ENV__SIMULATION_DURATION_SECONDS");

    assert_eq!(config.simulation_duration_seconds, 42);
}

/// A malformed file is not fatal either: the loader warns and falls back
/// to defaults rather than propagating a parse error.
#[test]
fn test_malformed_config_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("invalid.json");
    fs::write(&config_path, "{ this is not valid json").unwrap();

    let loader = ConfigLoader::new(Some(&config_path), "TEST_INVALID");
    let config = loader.load().unwrap();

    assert_eq!(
        config.simulation_duration_seconds,
        PipelineConfig::default().simulation_duration_seconds
    );
}

/// Only a validation failure on the merged result is fatal.
#[test]
fn test_invalid_values_fail_validation() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config_invalid_values.json");

    let mut defaults = PipelineConfig::default();
    defaults.base_preparation_handlers = 0;
    fs::write(
        &config_path,
        serde_json::to_string_pretty(&defaults).unwrap(),
    )
    .unwrap();

    let loader = ConfigLoader::new(Some(&config_path), "TEST_VALIDATION_FAIL");
    match loader.load() {
        Err(ConfigError::ValidationError(_)) => {}
        other => panic!("expected ValidationError, got {other:?}"),
    }
}
