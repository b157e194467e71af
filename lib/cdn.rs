//! CDN index files and distribution packages.
//!
//! Hosts discover bundles through two documents per endpoint: `index.json`,
//! a plain list of versions, and `index-v2.json`, which also points at each
//! version's template, binding and resource files. Both only ever grow.

use crate::config::{BuildSettings, BundleConfiguration};
use crate::constants::{INDEX_FILE, INDEX_V2_FILE, TEMPLATES_DIR};
use crate::error::BuildResult;
use crate::fs::{copy_file, ensure_dir, recreate_dir, write_json};
use crate::http::{HttpClient, fetch_json, fetch_json_or_default};
use crate::pack::{ArchiveOptions, ArchiveResult, extract_archive, extract_archive_matching, zip_directory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// `index.json`: every published version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexV1(Vec<String>);

/// `index-v2.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexV2 {
    /// Range hosts use when they do not request one. Older indexes omit it.
    #[serde(default)]
    pub default_version_range: String,

    /// Version -> resource kind -> resource version.
    #[serde(default)]
    pub bundle_versions: BTreeMap<String, BTreeMap<String, String>>,

    /// Template resources by schema, then version.
    #[serde(default)]
    pub templates: TemplateIndex,
}

/// `templates` section of [`IndexV2`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateIndex {
    #[serde(default)]
    pub v1: BTreeMap<String, BundleResource>,
}

/// Where one version's static content lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleResource {
    /// Templates list URL.
    pub functions: String,

    /// Bindings metadata URL.
    pub bindings: String,

    /// Resources URL with a `{locale}` placeholder.
    pub resources: String,
}

/// A CDN endpoint serving one bundle id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEndpoint {
    /// Endpoint base URL (`https://host`).
    pub url: String,

    /// Bundle id.
    pub bundle_id: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl IndexV1 {
    /// Add `version` unless already listed. Returns whether it was added.
    pub fn add(&mut self, version: &str) -> bool {
        if self.contains(version) {
            return false;
        }
        self.0.push(version.to_string());
        true
    }

    pub fn contains(&self, version: &str) -> bool {
        self.0.iter().any(|v| v == version)
    }

    pub fn versions(&self) -> &[String] {
        &self.0
    }
}

impl IndexV2 {
    /// Empty index for a bundle line.
    pub fn new(default_version_range: impl Into<String>) -> Self {
        Self {
            default_version_range: default_version_range.into(),
            bundle_versions: BTreeMap::new(),
            templates: TemplateIndex::default(),
        }
    }

    /// Register `version`. Existing entries are left untouched.
    ///
    /// Returns whether anything changed.
    pub fn try_add(&mut self, version: &str, resource: BundleResource) -> bool {
        let mut added = false;
        if !self.bundle_versions.contains_key(version) {
            self.bundle_versions.insert(
                version.to_string(),
                BTreeMap::from([("templates".to_string(), version.to_string())]),
            );
            added = true;
        }
        if !self.templates.v1.contains_key(version) {
            self.templates.v1.insert(version.to_string(), resource);
            added = true;
        }
        added
    }
}

impl IndexEndpoint {
    pub fn new(url: &str, bundle_id: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            bundle_id: bundle_id.to_string(),
        }
    }

    /// Local directory name: `<host>_<bundleId>`.
    pub fn directory_name(&self) -> String {
        let host = self
            .url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.url);
        format!("{}_{}", host.replace(['/', ':'], "_"), self.bundle_id)
    }

    /// `<endpoint>/public/ExtensionBundles/<bundleId>`.
    pub fn bundle_root_url(&self) -> String {
        format!("{}/public/ExtensionBundles/{}", self.url, self.bundle_id)
    }

    pub fn index_url(&self) -> String {
        format!("{}/{}", self.bundle_root_url(), INDEX_FILE)
    }

    pub fn index_v2_url(&self) -> String {
        format!("{}/{}", self.bundle_root_url(), INDEX_V2_FILE)
    }

    /// Static content URLs for `version`.
    pub fn bundle_resource(&self, version: &str) -> BundleResource {
        let base = format!("{}/{}/{}/v1", self.bundle_root_url(), version, TEMPLATES_DIR);
        BundleResource {
            functions: format!("{}/templates/templates.json", base),
            bindings: format!("{}/bindings/bindings.json", base),
            resources: format!("{}/resources/Resources.{{locale}}.json", base),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Lay out the CDN storage tree for every configured endpoint and zip each one.
///
/// Per endpoint, `build/cdn/<host>_<bundleId>/<bundleId>/` receives a
/// `<version>/` folder holding every package archive plus the non-binary
/// content of `primary_archive`, and updated copies of both index files
/// fetched from the endpoint.
pub fn create_cdn_package(
    http: &dyn HttpClient,
    settings: &BuildSettings,
    bundle: &BundleConfiguration,
    archives: &[PathBuf],
    primary_archive: &Path,
) -> BuildResult<Vec<ArchiveResult>> {
    let mut results = Vec::new();
    for url in &bundle.index_endpoints {
        let endpoint = IndexEndpoint::new(url, &bundle.bundle_id);
        let endpoint_dir = settings.cdn_dir().join(endpoint.directory_name());
        recreate_dir(&endpoint_dir, settings.delete_settle)?;

        let bundle_dir = endpoint_dir.join(&bundle.bundle_id);
        let version_dir = bundle_dir.join(&bundle.bundle_version);
        ensure_dir(&version_dir)?;

        for archive in archives {
            if let Some(name) = archive.file_name() {
                copy_file(archive, &version_dir.join(name))?;
            }
        }
        let extracted = extract_archive_matching(primary_archive, &version_dir, |name| {
            !is_binary_entry(name)
        })?;
        tracing::debug!("extracted {} content files into {}", extracted, version_dir.display());

        let mut index_v2 = fetch_json::<IndexV2>(http, &endpoint.index_v2_url())?
            .unwrap_or_else(|| IndexV2::new(bundle.default_version_range()));
        if index_v2.default_version_range.is_empty() {
            index_v2.default_version_range = bundle.default_version_range();
        }
        if !index_v2.try_add(&bundle.bundle_version, endpoint.bundle_resource(&bundle.bundle_version)) {
            tracing::warn!(
                "{} already lists {} in {}",
                endpoint.url,
                bundle.bundle_version,
                INDEX_V2_FILE
            );
        }
        write_json(&bundle_dir.join(INDEX_V2_FILE), &index_v2)?;

        let mut index: IndexV1 = fetch_json_or_default(http, &endpoint.index_url())?;
        index.add(&bundle.bundle_version);
        write_json(&bundle_dir.join(INDEX_FILE), &index)?;

        let output = settings
            .artifacts_dir
            .join(format!("{}.zip", endpoint.directory_name()));
        results.push(zip_directory(&endpoint_dir, &output, &ArchiveOptions::default())?);
    }
    Ok(results)
}

/// Build the RU distribution: `<bundleId>/<version>/` holding the extracted
/// bundle, zipped from the RU root.
pub fn create_ru_package(
    settings: &BuildSettings,
    bundle: &BundleConfiguration,
    primary_archive: &Path,
) -> BuildResult<ArchiveResult> {
    let ru_root = settings.ru_dir();
    recreate_dir(&ru_root, settings.delete_settle)?;

    let package_dir = ru_root.join(&bundle.bundle_id).join(&bundle.bundle_version);
    extract_archive(primary_archive, &package_dir)?;

    let output = settings.artifacts_dir.join(format!(
        "{}.{}_RU_package.zip",
        bundle.bundle_id, bundle.bundle_version
    ));
    zip_directory(&ru_root, &output, &ArchiveOptions::default())
}

/// Entries under a binaries directory stay inside the archive only.
fn is_binary_entry(name: &str) -> bool {
    let first = name.split('/').next().unwrap_or_default();
    first.eq_ignore_ascii_case("bin") || first.to_ascii_lowercase().starts_with("bin_")
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
