//! Post-upload integrity verification.
//!

use std::{fs::File, io, path::Path};

use md5::{Digest, Md5, digest::Output};
use thiserror::Error;
use tracing::{info, warn};

use crate::{artifact::BackupArtifact, config::IntegrityConfig, webdav::Client};

/// Verify that the uploaded copy matches the local artifact.
///
/// The size check is cheap and catches truncated uploads; the checksum
/// comparison is the expensive fallback that also catches corruption in
/// transit. On either mismatch the remote object is deleted before the
/// failure is reported. Transport failures are failures, the caller
/// decides whether to retry the whole run.
pub fn verify(
    client: &Client,
    config: &IntegrityConfig,
    artifact: &BackupArtifact,
    remote_url: &str,
) -> Result<(), VerifyError> {
    if !config.enable {
        info!("Integrity verification is disabled, skipping");
        return Ok(());
    }

    let timeout = config.check_timeout();

    info!("Verifying file size...");
    match client.head_size(remote_url, timeout)? {
        None => warn!("Remote file size is unknown, skipping size verification"),
        Some(remote_size) if remote_size != artifact.size_bytes => {
            warn!("Size mismatch, deleting the remote backup");
            client.delete(remote_url);
            return Err(VerifyError::SizeMismatch {
                local: artifact.size_bytes,
                remote: remote_size,
            });
        }
        Some(_) => {}
    }

    if !config.verify_checksum {
        info!("Checksum verification is disabled, skipping");
    } else if !config.within_checksum_threshold(artifact.size_bytes) {
        info!(
            "Skipping checksum verification, artifact exceeds the {} MB threshold",
            config.checksum_exclude_threshold_mb
        );
    } else {
        info!("Verifying MD5 checksum...");
        let local_digest =
            file_md5(&artifact.path).map_err(|e| VerifyError::Io(e, "hash the local artifact"))?;

        let mut response = client.fetch(remote_url, timeout)?;
        let mut hasher = Md5::new();
        io::copy(&mut response, &mut hasher)
            .map_err(|e| VerifyError::Io(e, "download the remote artifact"))?;
        let remote_digest = hasher.finalize();

        if local_digest != remote_digest {
            warn!("Checksum mismatch, deleting the remote backup");
            client.delete(remote_url);
            return Err(VerifyError::ChecksumMismatch {
                local: hex_string(local_digest.as_slice()),
                remote: hex_string(remote_digest.as_slice()),
            });
        }
    }

    info!("Integrity verification passed");
    Ok(())
}

/// Streaming MD5 of a file, fixed-size chunks.
fn file_md5(path: &Path) -> Result<Output<Md5>, io::Error> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    io::copy(&mut file, &mut hasher)?;

    Ok(hasher.finalize())
}

fn hex_string(digest: &[u8]) -> String {
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("File size mismatch, local: {local} bytes, remote: {remote} bytes")]
    SizeMismatch { local: u64, remote: u64 },

    #[error("MD5 checksum mismatch, local: {local}, remote: {remote}")]
    ChecksumMismatch { local: String, remote: String },

    #[error(transparent)]
    Transport(#[from] crate::webdav::WebDavError),

    #[error("Failed to {1}:\n{0}")]
    Io(#[source] io::Error, &'static str),
}
