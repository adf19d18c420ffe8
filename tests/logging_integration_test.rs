//! Integration tests for logging functionality

use karst::config::LoggingConfig;
use karst::domain::KarstError;
use karst::logging::init_logging;
use tempfile::TempDir;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(config.local_enabled);
    assert_eq!(config.local_path, "/var/log/karst");
    assert_eq!(config.local_rotation, "daily");
}

// The global subscriber can be installed once per process, so every
// init_logging assertion lives in this one test.
#[test]
fn test_init_logging_creates_directory_and_installs_once() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "hourly".to_string(),
    };

    assert!(matches!(
        init_logging("chatty", &config),
        Err(KarstError::Configuration(_))
    ));
    assert!(!log_path.exists());

    let guard = init_logging("debug", &config).unwrap();
    assert!(log_path.is_dir());
    tracing::info!(batch_id = "test", "Logging integration test");

    let second = init_logging("info", &LoggingConfig {
        local_enabled: false,
        ..config.clone()
    });
    assert!(matches!(second, Err(KarstError::Configuration(_))));

    drop(guard);
}
