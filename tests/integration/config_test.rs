use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use perfmon::core::config::MonitorConfig;
use perfmon::MonitorError;

#[test]
fn test_config_default() {
    let config = MonitorConfig::default();
    assert!(config.show_tps);
    assert!(!config.show_unique_logins);
    assert!(!config.check_for_updates_on_start);
    assert_eq!(config.tick_interval_ms, 50);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.json");

    let config = MonitorConfig {
        show_disk: false,
        show_unique_logins: true,
        rate_window_secs: 10,
        disk_path: PathBuf::from("/srv/data"),
        tps_warning_below: Some(15.0),
        ..Default::default()
    };

    let written = config.save(Some(&path)).unwrap();
    assert_eq!(written, path);

    let loaded = MonitorConfig::load(Some(&path)).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_load_missing_file_returns_default() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("absent.json");

    let config = MonitorConfig::load(Some(&path)).unwrap();
    assert_eq!(config, MonitorConfig::default());
}

#[test]
fn test_config_load_partial_file_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, r#"{ "show_tps": false, "report_interval_secs": 60 }"#).unwrap();

    let config = MonitorConfig::load(Some(&path)).unwrap();
    assert!(!config.show_tps);
    assert_eq!(config.report_interval_secs, 60);
    assert!(config.show_memory);
    assert_eq!(config.sample_interval_secs, 10);
}

#[test]
fn test_config_load_rejects_garbage() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(&path, "show_tps = yes").unwrap();

    let result = MonitorConfig::load(Some(&path));
    assert!(matches!(result, Err(MonitorError::Config(_))));
}

#[test]
fn test_config_load_rejects_invalid_values() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(
        &path,
        r#"{ "check_for_updates_on_start": true, "update_url": "ftp://example.org/v" }"#,
    )
    .unwrap();

    let result = MonitorConfig::load(Some(&path));
    assert!(matches!(result, Err(MonitorError::Config(_))));
}
