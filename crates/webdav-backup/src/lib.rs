//! # webdav-backup
//! Scheduled directory backups to a WebDAV server: archive, store a local
//! copy, upload, verify integrity, prune old copies on both sides, and
//! notify an operator by email.
//!

mod archive;
mod artifact;
mod config;
mod failure;
mod logger;
mod notify;
mod retention;
mod run;
mod verify;
mod webdav;

pub use archive::{ArchiveError, ArchiveFormat, ArchiveOutcome, UnsupportedFormat, create_archive};
pub use artifact::{BackupArtifact, backup_filename};
pub use config::{
    Config, IntegrityConfig, LoadConfigError, NotificationConfig, RetentionConfig, SmtpConfig,
    TransferConfig, TransferProfile, WebDavConfig,
};
pub use failure::OrFail;
pub use logger::{LoggerError, init_logger};
pub use notify::{NotificationKind, Notifier, NotifyError};
pub use retention::{RetentionPolicy, prune_local, prune_remote};
pub use run::{Context, RunError, RunSummary, run};
pub use verify::{VerifyError, verify};
pub use webdav::{
    Client, STATUS_TIMEOUT, STATUS_TRANSPORT_ERROR, UploadOutcome, USER_AGENT, WebDavError,
};
