//! Extension input list (`extensions.json` in the project source).

use crate::error::{BuildError, BuildResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// One extension package the bundle ships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extension {
    /// Package id. Unique within a list.
    pub id: String,

    /// Extension name as reported by the runtime.
    pub name: String,

    /// Pinned version. When absent the newest `majorVersion` release is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Major version the bundle is locked to.
    pub major_version: u64,

    /// Binding type names, in order.
    #[serde(default)]
    pub bindings: Vec<String>,
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}, v{}", self.id, v),
            None => write!(f, "{}, v{}", self.id, self.major_version),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Load an extension list and check that ids are unique.
pub fn load_extensions(path: &Path) -> BuildResult<Vec<Extension>> {
    if !path.is_file() {
        return Err(BuildError::ManifestNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let extensions: Vec<Extension> =
        serde_json::from_str(&content).map_err(|e| BuildError::ManifestParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    for (i, ext) in extensions.iter().enumerate() {
        if extensions[..i].iter().any(|e| e.id.eq_ignore_ascii_case(&ext.id)) {
            return Err(BuildError::ManifestParse {
                path: path.to_path_buf(),
                message: format!("extension id '{}' is listed more than once", ext.id),
            });
        }
    }

    Ok(extensions)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
