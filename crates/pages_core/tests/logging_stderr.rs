use pages_core::{init_from_config, init_logging, logging_status, LoggingError, PagesConfig};

#[test]
fn config_without_log_dir_logs_to_stderr() {
    let config = PagesConfig {
        log_level: Some("warn".to_string()),
        ..PagesConfig::default()
    };

    init_from_config(&config).unwrap();
    init_from_config(&config).unwrap();

    let (level, log_dir) = logging_status().expect("logging should be active");
    assert_eq!(level, "warn");
    assert_eq!(log_dir, None);
    assert!(log::log_enabled!(log::Level::Warn));
    assert!(!log::log_enabled!(log::Level::Info));

    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        init_logging("warn", dir.path().to_str().unwrap()),
        Err(LoggingError::Conflict(_))
    ));
}
