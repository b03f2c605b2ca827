//! Integration tests for logging configuration

use courier::config::LoggingConfig;
use courier::logging::init_logging;
use tempfile::TempDir;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(config.local_enabled);
    assert_eq!(config.local_rotation, "daily");
    assert_eq!(config.local_path, "/var/log/courier");
}

#[test]
fn test_invalid_level_is_rejected_before_subscriber_setup() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "hourly".to_string(),
    };

    assert!(init_logging("verbose", &config).is_err());
    // Nothing is created when the level is invalid
    assert!(!log_path.exists());
}

#[test]
fn test_logging_config_from_toml() {
    let config: LoggingConfig = toml::from_str(
        r#"
local_enabled = false
local_rotation = "hourly"
"#,
    )
    .unwrap();

    assert!(!config.local_enabled);
    assert_eq!(config.local_rotation, "hourly");
    assert_eq!(config.local_path, "/var/log/courier");
}
