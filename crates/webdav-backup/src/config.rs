//! Backup agent config
//!

use core::time::Duration;
use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::archive::ArchiveFormat;

/// The WebDAV endpoint to upload backups to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebDavConfig {
    /// The base URL of the WebDAV server.
    pub base_url: String,

    /// The collection path to upload into, relative to the base URL.
    pub upload_directory: String,

    /// The basic auth username.
    pub username: String,

    /// The basic auth password.
    pub password: String,
}

impl Default for WebDavConfig {
    fn default() -> Self {
        Self {
            base_url: "https://your-webdav-server.com".to_string(),
            upload_directory: "backups/docs".to_string(),
            username: "your_username".to_string(),
            password: "your_password".to_string(),
        }
    }
}

/// Timeout and rate-limit parameters for one file size tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferProfile {
    /// The maximum time the whole transfer may take in seconds.
    pub max_time_secs: u64,

    /// Upload rate limit such as `"2M"` (2 MB/s). Best effort, the
    /// transport may not enforce it.
    pub rate_limit: Option<String>,
}

impl TransferProfile {
    /// The maximum transfer time as a [`Duration`].
    pub fn max_time(&self) -> Duration {
        Duration::from_secs(self.max_time_secs)
    }
}

/// Upload transfer parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// The connect timeout for every request in seconds.
    pub connect_timeout_secs: u64,

    /// Whether large and small files use separate transfer profiles.
    /// When disabled the large file profile is used for everything.
    pub separate_file_parameters: bool,

    /// Files above this size in MB count as large.
    pub large_file_threshold_mb: u64,

    /// The profile for files at or below the threshold.
    pub small_file: TransferProfile,

    /// The profile for files above the threshold.
    pub large_file: TransferProfile,
}

impl TransferConfig {
    /// The connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Whether a file of `size_bytes` counts as large.
    pub fn is_large(&self, size_bytes: u64) -> bool {
        size_bytes > self.large_file_threshold_mb * 1024 * 1024
    }

    /// The transfer profile for a file of `size_bytes`.
    pub fn profile_for(&self, size_bytes: u64) -> &TransferProfile {
        if !self.separate_file_parameters || self.is_large(size_bytes) {
            &self.large_file
        } else {
            &self.small_file
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            separate_file_parameters: true,
            large_file_threshold_mb: 100,
            small_file: TransferProfile {
                max_time_secs: 1800,
                rate_limit: Some("2M".to_string()),
            },
            large_file: TransferProfile {
                max_time_secs: 7200,
                rate_limit: Some("1M".to_string()),
            },
        }
    }
}

/// How many backups to keep on either side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// The maximum number of backups kept on the WebDAV server.
    pub max_remote_backups: usize,

    /// The maximum number of backups kept locally.
    pub max_local_backups: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_remote_backups: 5,
            max_local_backups: 3,
        }
    }
}

/// Post-upload integrity verification parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityConfig {
    /// Whether to verify the uploaded file at all.
    pub enable: bool,

    /// The timeout for each verification request in seconds.
    pub check_timeout_secs: u64,

    /// Whether to download the uploaded file and compare MD5 checksums.
    pub verify_checksum: bool,

    /// Files above this size in MB skip the checksum comparison.
    /// 0 verifies every file.
    pub checksum_exclude_threshold_mb: u64,
}

impl IntegrityConfig {
    /// The verification request timeout as a [`Duration`].
    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }

    /// Whether a file of `size_bytes` is within the checksum threshold.
    pub fn within_checksum_threshold(&self, size_bytes: u64) -> bool {
        self.checksum_exclude_threshold_mb == 0
            || size_bytes <= self.checksum_exclude_threshold_mb * 1024 * 1024
    }
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            enable: true,
            check_timeout_secs: 300,
            verify_checksum: true,
            checksum_exclude_threshold_mb: 100,
        }
    }
}

/// The SMTP server to deliver notifications through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// The SMTP server host.
    pub server: String,

    /// The SMTP server port.
    pub port: u16,

    /// The SMTP username.
    pub username: String,

    /// The SMTP password.
    pub password: String,

    /// Whether to upgrade the connection with STARTTLS.
    pub use_starttls: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            server: "smtp.example.com".to_string(),
            port: 587,
            username: "your_email@example.com".to_string(),
            password: "your_email_password".to_string(),
            use_starttls: true,
        }
    }
}

/// Operator email notification parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Whether to send notification emails at all.
    pub enable: bool,

    /// Whether to send an email when a backup run succeeds.
    pub notify_on_success: bool,

    /// Whether to send an email when a backup run fails.
    pub notify_on_failure: bool,

    /// Prefix prepended to every subject as `[<prefix>]`.
    pub subject_prefix: String,

    /// The From header address.
    pub from_address: String,

    /// The From header display name.
    pub from_name: String,

    /// The recipient address.
    pub to_address: String,

    /// The SMTP transport settings.
    pub smtp: SmtpConfig,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enable: false,
            notify_on_success: true,
            notify_on_failure: true,
            subject_prefix: "Server".to_string(),
            from_address: "your_email@example.com".to_string(),
            from_name: "WebDAV Backup".to_string(),
            to_address: "recipient@example.com".to_string(),
            smtp: SmtpConfig::default(),
        }
    }
}

/// The backup agent's config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// The directory to back up.
    pub source_directory: PathBuf,

    /// The directory local backup copies are stored in.
    pub local_backup_directory: PathBuf,

    /// The backup filename prefix.
    pub backup_prefix: String,

    /// The archive format, `tar.gz` or `zip`.
    pub archive_format: ArchiveFormat,

    /// The WebDAV endpoint.
    pub webdav: WebDavConfig,

    /// The upload transfer parameters.
    pub transfer: TransferConfig,

    /// The retention limits.
    pub retention: RetentionConfig,

    /// The integrity verification parameters.
    pub integrity: IntegrityConfig,

    /// The notification parameters.
    pub notification: NotificationConfig,
}

impl Config {
    /// Tries to load a config from a toml file.
    pub fn load_toml(file_path: PathBuf) -> Result<Self, LoadConfigError> {
        if !file_path.exists() {
            return Err(LoadConfigError::NoFile);
        }

        let contents = fs::read_to_string(file_path).map_err(LoadConfigError::Read)?;
        let config = toml::from_str(&contents)?;

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_directory: PathBuf::from("/path/to/source/directory"),
            local_backup_directory: PathBuf::from("/path/to/local/backups"),
            backup_prefix: "backup".to_string(),
            archive_format: ArchiveFormat::TarGz,
            webdav: WebDavConfig::default(),
            transfer: TransferConfig::default(),
            retention: RetentionConfig::default(),
            integrity: IntegrityConfig::default(),
            notification: NotificationConfig::default(),
        }
    }
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("The file does not exist.")]
    NoFile,

    #[error("Failed to read the file:\n{0}")]
    Read(#[source] std::io::Error),

    #[error("Failed to deserialize the file:\n{0}")]
    Deserialize(#[from] toml::de::Error),
}
