//! Tests for config loading
//!

use std::fs;

use tempfile::tempdir;
use webdav_backup::{ArchiveFormat, Config, LoadConfigError};

#[test]
fn missing_file_is_reported() {
    let scratch = tempdir().unwrap();

    let error = Config::load_toml(scratch.path().join("config.toml")).unwrap_err();
    assert!(matches!(error, LoadConfigError::NoFile));
}

#[test]
fn default_config_round_trips() {
    let scratch = tempdir().unwrap();
    let path = scratch.path().join("config.toml");

    let contents = toml::to_string_pretty(&Config::default()).unwrap();
    fs::write(&path, contents).unwrap();

    let config = Config::load_toml(path).unwrap();

    assert_eq!(config.backup_prefix, "backup");
    assert_eq!(config.archive_format, ArchiveFormat::TarGz);
    assert_eq!(config.retention.max_remote_backups, 5);
    assert_eq!(config.retention.max_local_backups, 3);
    assert_eq!(config.transfer.connect_timeout_secs, 30);
    assert_eq!(config.transfer.small_file.rate_limit.as_deref(), Some("2M"));
    assert!(config.integrity.enable);
    assert!(!config.notification.enable);
}

#[test]
fn unsupported_archive_format_is_rejected() {
    let scratch = tempdir().unwrap();
    let path = scratch.path().join("config.toml");

    let contents = toml::to_string_pretty(&Config::default())
        .unwrap()
        .replace("archive_format = \"tar.gz\"", "archive_format = \"rar\"");
    fs::write(&path, contents).unwrap();

    let error = Config::load_toml(path).unwrap_err();
    assert!(error.to_string().contains("Unsupported backup format"));
}

#[test]
fn transfer_profile_follows_the_size_tier() {
    let config = Config::default();

    // 100 MB threshold: small files use the small profile.
    let small = config.transfer.profile_for(1024);
    assert_eq!(small.max_time_secs, 1800);

    let large = config.transfer.profile_for(200 * 1024 * 1024);
    assert_eq!(large.max_time_secs, 7200);

    // Separate parameters disabled: everything uses the large profile.
    let mut uniform = config.transfer.clone();
    uniform.separate_file_parameters = false;
    assert_eq!(uniform.profile_for(1024).max_time_secs, 7200);
}
