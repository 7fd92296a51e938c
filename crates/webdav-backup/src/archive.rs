//! Archive a directory tree into a single compressed file.
//!

use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use flate2::{Compression, write::GzEncoder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

/// The supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ArchiveFormat {
    /// A gzip compressed tarball.
    TarGz,
    /// A deflate compressed zip file.
    Zip,
}

impl ArchiveFormat {
    /// The file extension for this format, without a leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
        }
    }
}

impl TryFrom<String> for ArchiveFormat {
    type Error = UnsupportedFormat;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "tar.gz" => Ok(Self::TarGz),
            "zip" => Ok(Self::Zip),
            _ => Err(UnsupportedFormat(value)),
        }
    }
}

impl From<ArchiveFormat> for String {
    fn from(format: ArchiveFormat) -> Self {
        format.extension().to_string()
    }
}

/// The requested archive format is not one of the supported ones.
#[derive(Debug, Error)]
#[error("Unsupported backup format: '{0}', use 'tar.gz' or 'zip'")]
pub struct UnsupportedFormat(pub String);

/// The result of a successful archive run.
#[derive(Debug, Default)]
pub struct ArchiveOutcome {
    /// Entries that could not be added and were skipped.
    pub skipped: Vec<PathBuf>,
}

/// One entry to pack, with its path inside the archive.
struct Entry {
    path: PathBuf,
    archive_name: PathBuf,
    is_dir: bool,
}

/// Pack the full tree under `source` into a compressed file at `destination`.
///
/// Entries are rooted at the source directory's own base name, so extracting
/// the archive recreates `<source-name>/...`. Entries with non-portable
/// (non-ASCII) names are skipped with a warning rather than failing the
/// whole archive. The archive is written to a temporary name and renamed
/// into place once complete, so a fatal failure leaves no partial file at
/// `destination`.
pub fn create_archive(
    source: &Path,
    destination: &Path,
    format: ArchiveFormat,
) -> Result<ArchiveOutcome, ArchiveError> {
    if !source.is_dir() {
        return Err(ArchiveError::SourceNotFound(source.to_path_buf()));
    }

    let root_name = source
        .file_name()
        .ok_or_else(|| ArchiveError::SourceNotFound(source.to_path_buf()))?
        .to_os_string();

    let mut outcome = ArchiveOutcome::default();
    let entries = WalkDir::new(source)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    warn!("Could not read entry, skipping: {error}");
                    if let Some(path) = error.path() {
                        outcome.skipped.push(path.to_path_buf());
                    }
                    return None;
                }
            };

            let relative = match entry.path().strip_prefix(source) {
                Ok(relative) => relative,
                Err(_) => return None,
            };

            // Portable ASCII names only. Anything else is skipped rather
            // than aborting the whole backup.
            if !relative.to_str().is_some_and(str::is_ascii) {
                warn!("Entry has a non-portable name, skipping: {relative:?}");
                outcome.skipped.push(entry.path().to_path_buf());
                return None;
            }

            let file_type = entry.file_type();
            if !file_type.is_file() && !file_type.is_dir() {
                warn!(
                    "Entry is not a regular file or directory, skipping: {relative:?}"
                );
                outcome.skipped.push(entry.path().to_path_buf());
                return None;
            }

            Some(Entry {
                path: entry.path().to_path_buf(),
                archive_name: Path::new(&root_name).join(relative),
                is_dir: file_type.is_dir(),
            })
        })
        .collect::<Vec<_>>();

    let mut temp_path = destination.as_os_str().to_os_string();
    temp_path.push(".part");
    let temp_path = PathBuf::from(temp_path);

    let result = match format {
        ArchiveFormat::TarGz => write_tar_gz(&temp_path, source, &root_name, &entries, &mut outcome),
        ArchiveFormat::Zip => write_zip(&temp_path, &root_name, &entries, &mut outcome),
    };

    if let Err(error) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(error);
    }

    fs::rename(&temp_path, destination).map_err(|error| {
        let _ = fs::remove_file(&temp_path);
        ArchiveError::Io(error, "commit archive")
    })?;

    Ok(outcome)
}

fn write_tar_gz(
    temp_path: &Path,
    source: &Path,
    root_name: &std::ffi::OsStr,
    entries: &[Entry],
    outcome: &mut ArchiveOutcome,
) -> Result<(), ArchiveError> {
    let file = File::create(temp_path).map_err(|e| ArchiveError::Io(e, "create archive file"))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    builder
        .append_dir(root_name, source)
        .map_err(|e| ArchiveError::Io(e, "append archive root"))?;

    for entry in entries {
        let result = if entry.is_dir {
            builder.append_dir(&entry.archive_name, &entry.path)
        } else {
            builder.append_path_with_name(&entry.path, &entry.archive_name)
        };

        if let Err(error) = result {
            warn!("Could not add {:?} to the backup: {error}", entry.path);
            outcome.skipped.push(entry.path.clone());
        }
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| ArchiveError::Io(e, "finish tar stream"))?;
    encoder
        .finish()
        .map_err(|e| ArchiveError::Io(e, "finish gzip stream"))?;

    Ok(())
}

fn write_zip(
    temp_path: &Path,
    root_name: &std::ffi::OsStr,
    entries: &[Entry],
    outcome: &mut ArchiveOutcome,
) -> Result<(), ArchiveError> {
    let file = File::create(temp_path).map_err(|e| ArchiveError::Io(e, "create archive file"))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.add_directory(root_name.to_string_lossy(), options)?;

    for entry in entries {
        // Portability was checked during the walk, non-ASCII never gets here.
        let Some(name) = entry.archive_name.to_str() else {
            outcome.skipped.push(entry.path.clone());
            continue;
        };
        let name = name.replace('\\', "/");

        let result = if entry.is_dir {
            writer
                .add_directory(name.as_str(), options)
                .map_err(io::Error::other)
        } else {
            add_zip_file(&mut writer, &entry.path, &name, options)
        };

        if let Err(error) = result {
            warn!("Could not add {:?} to the backup: {error}", entry.path);
            outcome.skipped.push(entry.path.clone());
        }
    }

    writer.finish()?;

    Ok(())
}

fn add_zip_file(
    writer: &mut ZipWriter<File>,
    path: &Path,
    name: &str,
    options: SimpleFileOptions,
) -> Result<(), io::Error> {
    let mut file = File::open(path)?;
    writer.start_file(name, options).map_err(io::Error::other)?;
    io::copy(&mut file, writer)?;

    Ok(())
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Source directory '{0}' does not exist")]
    SourceNotFound(PathBuf),

    #[error("Failed to {1}:\n{0}")]
    Io(#[source] io::Error, &'static str),

    #[error("Failed to write zip archive:\n{0}")]
    Zip(#[from] zip::result::ZipError),
}
