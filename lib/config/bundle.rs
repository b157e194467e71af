//! Bundle identity and build policy loaded from `bundleConfig.json`.

use crate::constants::{DEFAULT_CDN_ENDPOINT, DEFAULT_PACKAGE_FEED, DEFAULT_REVIEWERS};
use crate::deps::{DiffMode, parse_major};
use crate::error::{BuildError, BuildResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Bundle configuration. Loaded once by the entry point and passed down.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleConfiguration {
    /// Bundle id (e.g. `Microsoft.Azure.Functions.ExtensionBundle`).
    pub bundle_id: String,

    /// Bundle version being built.
    pub bundle_version: String,

    /// Version of the template archive to bundle.
    pub template_version: String,

    /// Equality policy for the dependency approval gate.
    #[serde(default)]
    pub dependency_policy: DiffMode,

    /// CDN endpoints that receive index updates.
    #[serde(default = "default_index_endpoints")]
    pub index_endpoints: Vec<String>,

    /// Approvers named in drift reports.
    #[serde(default = "default_reviewers")]
    pub reviewers: Vec<String>,

    /// Package feed used to resolve unpinned extension versions.
    #[serde(default = "default_package_feed")]
    pub package_feed: String,
}

/// Contents of `bundle.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleIdentity {
    /// Bundle id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Bundle version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl BundleConfiguration {
    /// Load and check a bundle configuration file.
    pub fn load(path: &Path) -> BuildResult<Self> {
        if !path.is_file() {
            return Err(BuildError::ConfigParseError(format!(
                "bundle configuration not found at {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let config: BundleConfiguration = serde_json::from_str(&content)
            .map_err(|e| BuildError::ConfigParseError(format!("{}: {}", path.display(), e)))?;
        config.check()?;
        Ok(config)
    }

    /// Reject configurations the build cannot use.
    pub fn check(&self) -> BuildResult<()> {
        if self.bundle_id.trim().is_empty() {
            return Err(BuildError::ConfigParseError("bundleId is empty".into()));
        }
        if parse_major(&self.bundle_version).is_none() {
            return Err(BuildError::ConfigParseError(format!(
                "bundleVersion '{}' is not a version",
                self.bundle_version
            )));
        }
        if self.template_version.trim().is_empty() {
            return Err(BuildError::ConfigParseError("templateVersion is empty".into()));
        }
        Ok(())
    }

    /// Major component of the bundle version.
    pub fn bundle_major(&self) -> u64 {
        parse_major(&self.bundle_version).unwrap_or_default()
    }

    /// Version range hosts use when none is configured (`[4.*, 5.0.0)`).
    pub fn default_version_range(&self) -> String {
        let major = self.bundle_major();
        format!("[{}.*, {}.0.0)", major, major + 1)
    }

    /// Identity written into each bundle.
    pub fn identity(&self) -> BundleIdentity {
        BundleIdentity {
            id: Some(self.bundle_id.clone()),
            version: Some(self.bundle_version.clone()),
        }
    }
}

fn default_index_endpoints() -> Vec<String> {
    vec![DEFAULT_CDN_ENDPOINT.to_string()]
}

fn default_reviewers() -> Vec<String> {
    DEFAULT_REVIEWERS.iter().map(|s| s.to_string()).collect()
}

fn default_package_feed() -> String {
    DEFAULT_PACKAGE_FEED.to_string()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
