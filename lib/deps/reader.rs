//! Dependency manifest reading and runtime asset selection.

use super::types::{AssetGroup, DependencyManifest, RuntimeFile, RuntimeLibrary};
use crate::error::{BuildError, BuildResult};
use std::path::Path;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Load and structurally check a dependency manifest.
pub fn load_manifest(path: &Path) -> BuildResult<DependencyManifest> {
    if !path.is_file() {
        return Err(BuildError::ManifestNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    let manifest: DependencyManifest =
        serde_json::from_str(&content).map_err(|e| BuildError::ManifestParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    for library in &manifest.runtime_libraries {
        check_unique_runtimes(library).map_err(|message| BuildError::ManifestParse {
            path: path.to_path_buf(),
            message,
        })?;
    }

    Ok(manifest)
}

/// Read the runtime files a deployment for `rid_fallbacks` would contain.
///
/// `rid_fallbacks` is ordered most-specific first. The result is sorted by
/// file name.
pub fn read_runtime_files(path: &Path, rid_fallbacks: &[&str]) -> BuildResult<Vec<RuntimeFile>> {
    let manifest = load_manifest(path)?;
    Ok(select_runtime_files(&manifest, rid_fallbacks))
}

/// Select one asset group per library and collect their files.
pub fn select_runtime_files(
    manifest: &DependencyManifest,
    rid_fallbacks: &[&str],
) -> Vec<RuntimeFile> {
    let mut files: Vec<RuntimeFile> = manifest
        .runtime_libraries
        .iter()
        .flat_map(|library| library_files(library, rid_fallbacks))
        .collect();

    sort_by_file_name(&mut files);
    files
}

/// Sort runtime files by file name, breaking ties by path then versions.
pub fn sort_by_file_name(files: &mut [RuntimeFile]) {
    files.sort_by(|a, b| {
        a.file_name()
            .cmp(b.file_name())
            .then_with(|| a.path.cmp(&b.path))
            .then_with(|| a.assembly_version.cmp(&b.assembly_version))
            .then_with(|| a.file_version.cmp(&b.file_version))
    });
}

fn library_files(library: &RuntimeLibrary, rid_fallbacks: &[&str]) -> Vec<RuntimeFile> {
    let groups = &library.runtime_assembly_groups;

    // First matching fallback wins, in fallback order (not manifest order).
    let specific = rid_fallbacks
        .iter()
        .find_map(|rid| groups.iter().find(|g| g.matches_runtime(rid)));

    if let Some(group) = specific {
        return group.runtime_files.clone();
    }

    match groups.iter().find(|g| g.is_default()) {
        Some(group) => group.runtime_files.iter().map(flatten).collect(),
        None => Vec::new(),
    }
}

/// Default-group assets deploy flat at the bin root.
fn flatten(file: &RuntimeFile) -> RuntimeFile {
    RuntimeFile {
        path: file.file_name().to_string(),
        assembly_version: file.assembly_version.clone(),
        file_version: file.file_version.clone(),
    }
}

fn check_unique_runtimes(library: &RuntimeLibrary) -> Result<(), String> {
    let groups: &[AssetGroup] = &library.runtime_assembly_groups;
    for (i, group) in groups.iter().enumerate() {
        let duplicate = groups[i + 1..].iter().any(|other| {
            match (&group.runtime_identifier, &other.runtime_identifier) {
                (None, None) => true,
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                _ => false,
            }
        });
        if duplicate {
            return Err(format!(
                "library '{}' has more than one asset group for runtime '{}'",
                library.name,
                group.runtime_identifier.as_deref().unwrap_or("<default>")
            ));
        }
    }
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
