//! Dependency manifest types.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// One deployed binary asset as recorded in a dependency manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeFile {
    /// Asset path relative to the deployment root.
    pub path: String,

    /// Assembly version, if the asset carries one.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub assembly_version: Option<String>,

    /// File version, if the asset carries one.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub file_version: Option<String>,
}

/// Runtime files a library publishes for one runtime identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetGroup {
    /// Runtime identifier. Absent means the platform-agnostic default.
    #[serde(default, rename = "runtime", deserialize_with = "empty_as_none")]
    pub runtime_identifier: Option<String>,

    /// Files in manifest order.
    #[serde(default)]
    pub runtime_files: Vec<RuntimeFile>,
}

/// A dependency entry in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeLibrary {
    /// Library name.
    #[serde(default)]
    pub name: String,

    /// Library version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Per-runtime asset groups.
    #[serde(default)]
    pub runtime_assembly_groups: Vec<AssetGroup>,
}

/// Flat dependency manifest as produced by the external toolchain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyManifest {
    /// Every runtime library.
    pub runtime_libraries: Vec<RuntimeLibrary>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl RuntimeFile {
    /// Create a runtime file entry.
    pub fn new(
        path: impl Into<String>,
        assembly_version: Option<&str>,
        file_version: Option<&str>,
    ) -> Self {
        Self {
            path: path.into(),
            assembly_version: assembly_version.map(str::to_string),
            file_version: file_version.map(str::to_string),
        }
    }

    /// Final path component. Both `/` and `\` count as separators.
    pub fn file_name(&self) -> &str {
        self.path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(self.path.as_str())
    }

    /// Major component of the assembly version, when it parses.
    pub fn assembly_major(&self) -> Option<u64> {
        self.assembly_version.as_deref().and_then(parse_major)
    }

    /// Assembly version for display, `-` when unset.
    pub fn assembly_version_display(&self) -> &str {
        self.assembly_version.as_deref().unwrap_or("-")
    }

    /// File version for display, `-` when unset.
    pub fn file_version_display(&self) -> &str {
        self.file_version.as_deref().unwrap_or("-")
    }
}

impl AssetGroup {
    /// Whether this is the platform-agnostic group.
    pub fn is_default(&self) -> bool {
        self.runtime_identifier.is_none()
    }

    /// Case-insensitive runtime identifier match.
    pub fn matches_runtime(&self, rid: &str) -> bool {
        self.runtime_identifier
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case(rid))
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for RuntimeFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.file_name(),
            self.assembly_version_display()
        )
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Parse the major component of a dotted numeric version (`1` to `1.2.3.4`).
///
/// Prerelease or build suffixes on the last component (`1.2.3-beta`) are
/// tolerated. Anything else is unparseable and yields `None`.
pub fn parse_major(version: &str) -> Option<u64> {
    let core = version.trim();
    let core = core.split(['-', '+']).next()?;
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 4 {
        return None;
    }

    let mut numbers = parts.iter().map(|p| {
        if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
            None
        } else {
            p.parse::<u64>().ok()
        }
    });

    let major = numbers.next()??;
    for n in numbers {
        n?;
    }
    Some(major)
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
