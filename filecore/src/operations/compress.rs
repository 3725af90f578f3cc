//! Compress, per spec.md §4.G operation 6.
//!
//! Formats: `zip`, `tar+gz`, `tar+xz`, `tar+zst`. `7z` compression is
//! explicitly unsupported — `sevenz-rust` (the archive library this core
//! leans on for the format, per Design Notes §9) only implements 7z
//! *reading*; see DESIGN.md for the resolution. 7z archives can still be
//! extracted (see [`super::extract`]).

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;

use crate::error::{Error, Result};
use crate::operations::progress::ProgressInfo;
use crate::task::Cancellable;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
    TarXz,
    TarZst,
}

impl ArchiveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::TarXz => "tar.xz",
            ArchiveFormat::TarZst => "tar.zst",
        }
    }
}

/// Walks `sources` depth-first and writes a single archive at `dest`,
/// reporting `scanned`/`progress` callbacks through `progress` as the spec's
/// archive-writer collaborator would.
pub fn compress(
    sources: &[PathBuf],
    dest: &Path,
    format: ArchiveFormat,
    passphrase: Option<&str>,
    cancellable: &Cancellable,
    progress: &ProgressInfo,
) -> Result<()> {
    let entries = scan(sources)?;
    progress.set_status(format!("scanned {} entries", entries.len()));

    match format {
        ArchiveFormat::Zip => write_zip(&entries, dest, passphrase, cancellable, progress),
        ArchiveFormat::TarGz | ArchiveFormat::TarXz | ArchiveFormat::TarZst => {
            if passphrase.is_some() {
                return Err(Error::UnsupportedFormat("tar-based formats do not support a passphrase".into()));
            }
            write_tar(&entries, dest, format, cancellable, progress)
        }
    }
}

struct Entry {
    /// Path within the archive, e.g. `src/file.txt`.
    archive_path: String,
    source: PathBuf,
    is_dir: bool,
}

fn scan(sources: &[PathBuf]) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    for source in sources {
        let parent = source.parent().unwrap_or(Path::new(""));
        for walked in WalkDir::new(source) {
            let walked = walked.map_err(|e| Error::Io(e.to_string()))?;
            let relative = walked.path().strip_prefix(parent).unwrap_or(walked.path());
            entries.push(Entry {
                archive_path: relative.to_string_lossy().replace('\\', "/"),
                source: walked.path().to_path_buf(),
                is_dir: walked.file_type().is_dir(),
            });
        }
    }
    Ok(entries)
}

fn write_zip(
    entries: &[Entry],
    dest: &Path,
    passphrase: Option<&str>,
    cancellable: &Cancellable,
    progress: &ProgressInfo,
) -> Result<()> {
    let file = File::create(dest)?;
    let mut writer = zip::ZipWriter::new(file);
    let total = entries.len().max(1);
    for (i, entry) in entries.iter().enumerate() {
        cancellable.check()?;
        let mut options = SimpleFileOptions::default();
        if let Some(password) = passphrase {
            options = options.with_aes_encryption(zip::AesMode::Aes256, password);
        }
        if entry.is_dir {
            writer.add_directory(&entry.archive_path, options).map_err(zip_err)?;
        } else {
            writer.start_file(&entry.archive_path, options).map_err(zip_err)?;
            let bytes = std::fs::read(&entry.source)?;
            writer.write_all(&bytes)?;
        }
        progress.set_fraction((i + 1) as f64 / total as f64);
    }
    writer.finish().map_err(zip_err)?;
    Ok(())
}

fn zip_err(e: zip::result::ZipError) -> Error {
    Error::Other(e.to_string())
}

fn write_tar(
    entries: &[Entry],
    dest: &Path,
    format: ArchiveFormat,
    cancellable: &Cancellable,
    progress: &ProgressInfo,
) -> Result<()> {
    let file = File::create(dest)?;
    let encoder: Box<dyn Write> = match format {
        ArchiveFormat::TarGz => Box::new(flate2::write::GzEncoder::new(file, flate2::Compression::default())),
        ArchiveFormat::TarXz => Box::new(xz2::write::XzEncoder::new(file, 6)),
        ArchiveFormat::TarZst => Box::new(zstd::stream::Encoder::new(file, 0)?.auto_finish()),
        ArchiveFormat::Zip => unreachable!(),
    };
    let mut builder = tar::Builder::new(encoder);
    let total = entries.len().max(1);
    for (i, entry) in entries.iter().enumerate() {
        cancellable.check()?;
        if entry.is_dir {
            builder.append_dir(&entry.archive_path, &entry.source)?;
        } else {
            let mut f = File::open(&entry.source)?;
            builder.append_file(&entry.archive_path, &mut f)?;
        }
        progress.set_fraction((i + 1) as f64 / total as f64);
    }
    builder.into_inner()?;
    Ok(())
}
