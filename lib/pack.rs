//! Zip archive creation and extraction.

use crate::error::{BuildError, BuildResult};
use crate::fs::ensure_dir;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Progress event emitted while archiving.
#[derive(Debug, Clone)]
pub enum ArchiveProgress {
    /// Starting, with total file count.
    Started { total_files: usize },
    /// A file was added to the archive.
    FileAdded { path: String, current: usize },
    /// Archive written.
    Finished,
}

/// Callback type for progress events.
pub type ProgressCallback = Arc<dyn Fn(ArchiveProgress) + Send + Sync>;

/// Options for [`zip_directory`].
#[derive(Clone)]
pub struct ArchiveOptions {
    /// Entry compression. Bundles are stored uncompressed.
    pub compression: CompressionMethod,

    /// Progress callback.
    pub on_progress: Option<ProgressCallback>,
}

/// Result of archiving a directory.
#[derive(Debug)]
pub struct ArchiveResult {
    /// Path to the created archive.
    pub output_path: PathBuf,

    /// Number of files included.
    pub file_count: usize,

    /// Total uncompressed size in bytes.
    pub total_size: u64,

    /// Archive size in bytes.
    pub compressed_size: u64,

    /// SHA-256 checksum of the archive.
    pub checksum: String,
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            compression: CompressionMethod::Stored,
            on_progress: None,
        }
    }
}

impl std::fmt::Debug for ArchiveOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveOptions")
            .field("compression", &self.compression)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Zip the contents of `src` (not `src` itself) into `dest`.
///
/// Entries are added in sorted order with `/` separators, so the same tree
/// always produces the same entry list. `dest` must not lie inside `src`.
pub fn zip_directory(src: &Path, dest: &Path, options: &ArchiveOptions) -> BuildResult<ArchiveResult> {
    if !src.is_dir() {
        return Err(BuildError::MissingArtifact(src.to_path_buf()));
    }
    if let (Ok(src_abs), Some(dest_parent)) = (src.canonicalize(), dest.parent()) {
        let dest_parent = dest_parent.canonicalize().unwrap_or(dest_parent.to_path_buf());
        if dest_parent.starts_with(&src_abs) {
            return Err(BuildError::Generic(format!(
                "archive {} would be written inside the directory being archived",
                dest.display()
            )));
        }
    }

    // 1. Collect entries first (for progress reporting)
    let mut entries: Vec<(PathBuf, String, bool)> = Vec::new();
    for entry in WalkDir::new(src).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src)?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        entries.push((entry.path().to_path_buf(), name, entry.file_type().is_dir()));
    }

    let total_files = entries.iter().filter(|(_, _, is_dir)| !is_dir).count();
    if let Some(ref cb) = options.on_progress {
        cb(ArchiveProgress::Started { total_files });
    }

    // 2. Write the archive
    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }
    let mut zip = ZipWriter::new(File::create(dest)?);
    let file_options = SimpleFileOptions::default()
        .compression_method(options.compression)
        .unix_permissions(0o644);

    let mut file_count = 0;
    let mut total_size = 0u64;
    for (path, name, is_dir) in entries {
        if is_dir {
            zip.add_directory(format!("{}/", name), file_options)?;
            continue;
        }

        let mut contents = Vec::new();
        File::open(&path)?.read_to_end(&mut contents)?;
        total_size += contents.len() as u64;
        file_count += 1;

        zip.start_file(name.as_str(), file_options)?;
        zip.write_all(&contents)?;

        if let Some(ref cb) = options.on_progress {
            cb(ArchiveProgress::FileAdded {
                path: name,
                current: file_count,
            });
        }
    }
    zip.finish()?;

    if let Some(ref cb) = options.on_progress {
        cb(ArchiveProgress::Finished);
    }

    let compressed_size = std::fs::metadata(dest)?.len();
    let checksum = file_sha256(dest)?;
    tracing::debug!(
        files = file_count,
        bytes = compressed_size,
        "archived {} -> {}",
        src.display(),
        dest.display()
    );

    Ok(ArchiveResult {
        output_path: dest.to_path_buf(),
        file_count,
        total_size,
        compressed_size,
        checksum,
    })
}

/// Extract every entry of `archive` into `dest`, overwriting existing files.
pub fn extract_archive(archive: &Path, dest: &Path) -> BuildResult<usize> {
    extract_archive_matching(archive, dest, |_| true)
}

/// Extract the entries whose `/`-separated name satisfies `keep`.
pub fn extract_archive_matching(
    archive: &Path,
    dest: &Path,
    keep: impl Fn(&str) -> bool,
) -> BuildResult<usize> {
    if !archive.is_file() {
        return Err(BuildError::MissingArtifact(archive.to_path_buf()));
    }
    let mut zip = ZipArchive::new(File::open(archive)?)?;
    ensure_dir(dest)?;

    let mut count = 0;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let relative = entry.enclosed_name().ok_or_else(|| {
            BuildError::Generic(format!(
                "invalid entry path '{}' in {}",
                entry.name(),
                archive.display()
            ))
        })?;
        let target = dest.join(relative);

        if !keep(&entry.name().replace('\\', "/")) {
            continue;
        }
        if entry.is_dir() {
            ensure_dir(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            ensure_dir(parent)?;
        }
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents)?;
        std::fs::write(&target, &contents)?;
        count += 1;
    }

    Ok(count)
}

/// SHA-256 of a file on disk.
pub fn file_sha256(path: &Path) -> BuildResult<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// List entry names of an archive.
pub fn archive_entries(archive: &Path) -> BuildResult<Vec<String>> {
    let zip = ZipArchive::new(File::open(archive)?)?;
    Ok(zip.file_names().map(|s| s.to_string()).collect())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
