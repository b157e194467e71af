//! Bundle assembly: published binaries + templates + identity -> archive.

use crate::catalog::{BuildCatalog, BundlePackageConfiguration, join_sub_path};
use crate::config::{BuildSettings, BundleConfiguration, Extension};
use crate::constants::{BUNDLE_JSON_FILE, EXTENSIONS_JSON_FILE, GENERATED_PROJECT_FILE, TEMPLATES_DIR};
use crate::error::{BuildError, BuildResult};
use crate::fs::{copy_dir, copy_file, recreate_dir, write_json};
use crate::pack::{ArchiveOptions, ArchiveResult, zip_directory};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A bundle directory ready to be archived.
#[derive(Debug, Clone)]
pub struct StagedBundle {
    /// Package this bundle was staged for.
    pub package: BundlePackageConfiguration,

    /// `<bundleId>.<version>[_<package>]`.
    pub bundle_name: String,

    /// Staged bundle root.
    pub directory: PathBuf,

    /// Patched `extensions.json` files, one per included configuration.
    pub extension_manifests: Vec<PathBuf>,
}

/// Runtime-generated `extensions.json` found next to published binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionsManifest {
    #[serde(alias = "Extensions")]
    pub extensions: Vec<ExtensionEntry>,

    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

/// One startup entry in [`ExtensionsManifest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionEntry {
    /// Extension name. Matched case-insensitively against the input list.
    pub name: String,

    /// Startup type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,

    /// Binding type names copied from the input list.
    #[serde(default)]
    pub bindings: Vec<String>,

    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Stage a fresh bundle directory for `package`.
///
/// Copies each included configuration's published binaries to its bundle
/// sub-path, joins binding metadata into every copied `extensions.json`,
/// then adds templates, `bundle.json` and the project file. Fails before
/// anything is archived if an output extension has no input entry.
pub fn stage_bundle(
    settings: &BuildSettings,
    bundle: &BundleConfiguration,
    catalog: &BuildCatalog,
    package: &BundlePackageConfiguration,
    extensions: &[Extension],
) -> BuildResult<StagedBundle> {
    let bundle_name = package.bundle_name(bundle);
    let directory = settings.bundles_dir().join(&bundle_name);
    recreate_dir(&directory, settings.delete_settle)?;
    tracing::info!("staging {} in {}", bundle_name, directory.display());

    let mut extension_manifests = Vec::new();
    for id in &package.configs_to_include {
        let config = catalog.get(*id).ok_or_else(|| {
            BuildError::InvalidCatalog(format!("configuration {} is not in the catalog", id))
        })?;
        let target = join_sub_path(&directory, &config.output_bin_sub_path);
        copy_dir(&config.publish_bin_directory(&settings.bin_dir), &target)?;

        let manifest = target.join(EXTENSIONS_JSON_FILE);
        if !manifest.is_file() {
            return Err(BuildError::MissingArtifact(manifest));
        }
        add_binding_info(&manifest, extensions)?;
        extension_manifests.push(manifest);
    }

    copy_dir(&settings.templates_dir(), &directory.join(TEMPLATES_DIR))?;
    write_json(&directory.join(BUNDLE_JSON_FILE), &bundle.identity())?;
    copy_file(
        &package_project_file(settings, catalog, package),
        &directory.join(GENERATED_PROJECT_FILE),
    )?;

    Ok(StagedBundle {
        package: package.clone(),
        bundle_name,
        directory,
        extension_manifests,
    })
}

/// Archive a staged bundle to its deterministic artifact path.
pub fn archive_bundle(
    settings: &BuildSettings,
    bundle: &BundleConfiguration,
    staged: &StagedBundle,
) -> BuildResult<ArchiveResult> {
    let output = staged.package.zip_file_path(bundle, &settings.artifacts_dir);
    zip_directory(&staged.directory, &output, &ArchiveOptions::default())
}

/// Stage then archive one package.
pub fn assemble_bundle(
    settings: &BuildSettings,
    bundle: &BundleConfiguration,
    catalog: &BuildCatalog,
    package: &BundlePackageConfiguration,
    extensions: &[Extension],
) -> BuildResult<ArchiveResult> {
    let staged = stage_bundle(settings, bundle, catalog, package, extensions)?;
    archive_bundle(settings, bundle, &staged)
}

/// Copy binding names from the input list into an output `extensions.json`.
///
/// Every output entry must match an input extension by name, ignoring case.
pub fn add_binding_info(path: &Path, extensions: &[Extension]) -> BuildResult<usize> {
    let content = std::fs::read_to_string(path)?;
    let mut manifest: ExtensionsManifest =
        serde_json::from_str(&content).map_err(|e| BuildError::ManifestParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    for entry in &mut manifest.extensions {
        let input = extensions
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(&entry.name))
            .ok_or_else(|| BuildError::BindingMismatch {
                name: entry.name.clone(),
                file: path.to_path_buf(),
                known: extensions.iter().map(|e| e.name.clone()).collect(),
            })?;
        entry.bindings = input.bindings.clone();
    }

    write_json(path, &manifest)?;
    Ok(manifest.extensions.len())
}

/// The generated project behind `package`, or its source template when no
/// included configuration generated one.
fn package_project_file(
    settings: &BuildSettings,
    catalog: &BuildCatalog,
    package: &BundlePackageConfiguration,
) -> PathBuf {
    package
        .configs_to_include
        .iter()
        .filter_map(|id| catalog.get(*id))
        .filter(|c| c.source_project_file == package.project_file)
        .map(|c| settings.project_dir(c.config_id).join(GENERATED_PROJECT_FILE))
        .find(|p| p.is_file())
        .unwrap_or_else(|| settings.source_project(&package.project_file))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
