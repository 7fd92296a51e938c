//! The backup pipeline, one stage at a time.
//!

use core::fmt::Display;
use std::{fs, io, path::PathBuf};

use chrono::Local;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    archive::{self, ArchiveError},
    artifact::{BackupArtifact, backup_filename},
    config::Config,
    retention::{RetentionPolicy, prune_local, prune_remote},
    verify::{VerifyError, verify},
    webdav::{Client, WebDavError},
};

/// Holds the pipeline's current stage. Used for prefixing logs.
#[derive(Default, Debug)]
pub struct Context {
    /// The stage the pipeline is in.
    pub current_stage: &'static str,
}

impl Display for Context {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[{}] ", self.current_stage)
    }
}

/// What a successful run produced.
#[derive(Debug)]
pub struct RunSummary {
    /// The artifact written locally and uploaded.
    pub artifact: BackupArtifact,

    /// Where the artifact landed on the WebDAV server.
    pub remote_url: String,
}

/// Run the whole backup pipeline once.
///
/// Stages run strictly in order, each to completion: check the source,
/// prepare the local directory, archive, ensure the remote collection,
/// upload, verify, prune remote, prune local. A rejected upload or a failed
/// verification still prunes local copies so local retention holds
/// regardless of the remote outcome; no remote pruning happens on those
/// paths. The caller maps the result to notifications and the exit code.
pub fn run(config: &Config) -> Result<RunSummary, RunError> {
    let mut context = Context::default();

    context.current_stage = "Check Source";
    if !config.source_directory.is_dir() {
        error!(
            "{context}Source directory {:?} does not exist",
            config.source_directory
        );
        return Err(RunError::SourceNotFound(config.source_directory.clone()));
    }

    context.current_stage = "Prepare Local Directory";
    info!(
        "{context}Preparing local backup directory: {}",
        config.local_backup_directory.display()
    );
    fs::create_dir_all(&config.local_backup_directory)
        .map_err(|e| RunError::CreateLocalDir(config.local_backup_directory.clone(), e))?;

    context.current_stage = "Archive";
    let filename = backup_filename(&config.backup_prefix, config.archive_format, Local::now());
    let local_path = config.local_backup_directory.join(&filename);
    info!("{context}Creating backup file: {}", local_path.display());

    let outcome = archive::create_archive(
        &config.source_directory,
        &local_path,
        config.archive_format,
    )?;
    if !outcome.skipped.is_empty() {
        warn!(
            "{context}Skipped {} entries with non-portable names or read errors",
            outcome.skipped.len()
        );
    }

    let size_bytes = fs::metadata(&local_path)
        .map_err(|e| RunError::Archive(ArchiveError::Io(e, "read artifact metadata")))?
        .len();
    let artifact = BackupArtifact {
        filename,
        path: local_path,
        size_bytes,
    };

    let local_policy = RetentionPolicy {
        prefix: config.backup_prefix.clone(),
        max_count: config.retention.max_local_backups,
    };
    let remote_policy = RetentionPolicy {
        prefix: config.backup_prefix.clone(),
        max_count: config.retention.max_remote_backups,
    };

    context.current_stage = "Ensure Collection";
    info!(
        "{context}Creating the WebDAV collection path: {}",
        config.webdav.upload_directory
    );
    let client = Client::new(&config.webdav, config.transfer.connect_timeout())
        .map_err(RunError::CreateClient)?;
    client
        .ensure_collection(&config.webdav.upload_directory)
        .map_err(RunError::Collection)?;

    context.current_stage = "Upload";
    info!("{context}File size: {:.2} MB", artifact.size_mb());
    if config.transfer.separate_file_parameters {
        if config.transfer.is_large(artifact.size_bytes) {
            info!("{context}Large file detected, using the large file transfer profile...");
        } else {
            info!("{context}Using the small file transfer profile...");
        }
    } else {
        info!("{context}Using the uniform transfer profile...");
    }
    let profile = config.transfer.profile_for(artifact.size_bytes);
    if let Some(rate) = &profile.rate_limit {
        info!("{context}Rate limit '{rate}' is not enforced by the transport, ignoring");
    }

    let remote_url = client.file_url(&config.webdav.upload_directory, &artifact.filename);
    let upload = client
        .upload(&artifact.path, &remote_url, profile.max_time())
        .map_err(RunError::UploadRead)?;

    if !matches!(upload.status, 200 | 201 | 204) {
        error!("{context}Upload failed with HTTP status {}", upload.status);
        prune_local(&config.local_backup_directory, &local_policy, &artifact.filename);
        return Err(RunError::UploadRejected {
            status: upload.status,
            url: upload.url,
        });
    }
    info!("{context}Upload succeeded");

    context.current_stage = "Verify";
    if let Err(verify_error) = verify(&client, &config.integrity, &artifact, &remote_url) {
        error!("{context}{verify_error}");
        prune_local(&config.local_backup_directory, &local_policy, &artifact.filename);
        return Err(RunError::Verify(verify_error));
    }

    prune_remote(
        &client,
        &config.webdav.upload_directory,
        &remote_policy,
        &artifact.filename,
        config.transfer.connect_timeout(),
    );

    prune_local(&config.local_backup_directory, &local_policy, &artifact.filename);

    Ok(RunSummary {
        artifact,
        remote_url,
    })
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Source directory '{0}' does not exist")]
    SourceNotFound(PathBuf),

    #[error("Failed to create local backup directory '{0}':\n{1}")]
    CreateLocalDir(PathBuf, #[source] io::Error),

    #[error("Failed to create the backup archive:\n{0}")]
    Archive(#[from] ArchiveError),

    #[error("Failed to create the WebDAV client:\n{0}")]
    CreateClient(#[source] WebDavError),

    #[error("Failed to create the remote collection:\n{0}")]
    Collection(#[source] WebDavError),

    #[error("Failed to read the backup artifact for upload:\n{0}")]
    UploadRead(#[source] WebDavError),

    #[error("WebDAV upload of '{url}' failed with HTTP status {status}")]
    UploadRejected { status: u16, url: String },

    #[error("Integrity verification failed:\n{0}")]
    Verify(#[from] VerifyError),
}

impl RunError {
    /// The subject line for this failure's notification email.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::SourceNotFound(_) => "WebDAV backup failed - source directory missing",
            Self::CreateLocalDir(..) => "WebDAV backup failed - local directory error",
            Self::Archive(_) => "WebDAV backup failed - archive error",
            Self::CreateClient(_) | Self::UploadRead(_) => "WebDAV backup failed - system error",
            Self::Collection(_) => "WebDAV backup failed - remote collection error",
            Self::UploadRejected { .. } => "WebDAV backup failed - upload failed",
            Self::Verify(VerifyError::SizeMismatch { .. }) => {
                "WebDAV backup failed - size verification failed"
            }
            Self::Verify(VerifyError::ChecksumMismatch { .. }) => {
                "WebDAV backup failed - checksum verification failed"
            }
            Self::Verify(_) => "WebDAV backup failed - integrity check error",
        }
    }
}
