//! Filesystem helpers with ensure-then-write and delete-then-recreate semantics.

use crate::error::{BuildError, BuildResult};
use std::path::Path;
use std::time::Duration;
use walkdir::WalkDir;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Create `path` and its parents if missing.
pub fn ensure_dir(path: &Path) -> BuildResult<()> {
    if !path.is_dir() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Write `contents` to `path`, creating parent directories first.
pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> BuildResult<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}

/// Serialize `value` as indented JSON into `path`.
pub fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> BuildResult<()> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    write_file(path, json)
}

/// Copy one file, creating the destination's parent directories. Overwrites.
pub fn copy_file(src: &Path, dest: &Path) -> BuildResult<u64> {
    if !src.is_file() {
        return Err(BuildError::MissingArtifact(src.to_path_buf()));
    }
    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }
    tracing::debug!("copy {} -> {}", src.display(), dest.display());
    Ok(std::fs::copy(src, dest)?)
}

/// Recursively copy the contents of `src` into `dest`. Returns the number of files copied.
pub fn copy_dir(src: &Path, dest: &Path) -> BuildResult<usize> {
    if !src.is_dir() {
        return Err(BuildError::MissingArtifact(src.to_path_buf()));
    }
    ensure_dir(dest)?;

    let mut count = 0;
    for entry in WalkDir::new(src).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src)?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
            count += 1;
        }
    }

    tracing::debug!("copied {} files {} -> {}", count, src.display(), dest.display());
    Ok(count)
}

/// Delete a directory tree if present, then wait `settle` before returning.
///
/// Some filesystems report the delete before the directory can be recreated.
pub fn delete_dir(path: &Path, settle: Duration) -> BuildResult<()> {
    if !path.exists() {
        return Ok(());
    }
    tracing::debug!("delete {}", path.display());
    std::fs::remove_dir_all(path)?;
    if !settle.is_zero() {
        std::thread::sleep(settle);
    }
    Ok(())
}

/// Force-delete then recreate an empty directory.
pub fn recreate_dir(path: &Path, settle: Duration) -> BuildResult<()> {
    delete_dir(path, settle)?;
    ensure_dir(path)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_file_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c.txt");
        write_file(&path, "hello").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }

    #[test]
    fn test_copy_dir_recursive() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write_file(&src.join("one.dll"), "1").unwrap();
        write_file(&src.join("runtimes/win/two.dll"), "2").unwrap();
        std::fs::create_dir_all(src.join("empty")).unwrap();

        let dest = dir.path().join("dest");
        let count = copy_dir(&src, &dest).unwrap();

        assert_eq!(count, 2);
        assert!(dest.join("one.dll").is_file());
        assert!(dest.join("runtimes/win/two.dll").is_file());
        assert!(dest.join("empty").is_dir());
    }

    #[test]
    fn test_copy_missing_source() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            copy_dir(&dir.path().join("nope"), &dir.path().join("dest")),
            Err(BuildError::MissingArtifact(_))
        ));
        assert!(matches!(
            copy_file(&dir.path().join("nope.txt"), &dir.path().join("x.txt")),
            Err(BuildError::MissingArtifact(_))
        ));
    }

    #[test]
    fn test_recreate_dir_empties() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("build");
        write_file(&target.join("stale.txt"), "old").unwrap();

        recreate_dir(&target, Duration::ZERO).unwrap();

        assert!(target.is_dir());
        assert_eq!(std::fs::read_dir(&target).unwrap().count(), 0);
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let dir = TempDir::new().unwrap();
        delete_dir(&dir.path().join("missing"), Duration::ZERO).unwrap();
    }
}
