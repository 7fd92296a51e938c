//! The backup artifact produced by a single run.
//!

use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::archive::ArchiveFormat;

/// One compressed backup file produced by a single run.
#[derive(Debug, Clone)]
pub struct BackupArtifact {
    /// The artifact's filename, `<prefix>_<YYYYMMDD>_<HHMMSS>.<ext>`.
    pub filename: String,

    /// The path of the local copy.
    pub path: PathBuf,

    /// The size of the local copy in bytes.
    pub size_bytes: u64,
}

impl BackupArtifact {
    /// The artifact size in MB.
    #[allow(clippy::as_conversions, clippy::cast_precision_loss)]
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0 / 1024.0
    }
}

/// The filename for a backup taken at `timestamp`.
///
/// The fixed-width timestamp makes lexicographic filename order
/// chronological, which retention relies on.
pub fn backup_filename(prefix: &str, format: ArchiveFormat, timestamp: DateTime<Local>) -> String {
    format!(
        "{prefix}_{}.{}",
        timestamp.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}
