//! Directory layout and environment-derived build switches.

use crate::catalog::{ConfigId, HostPlatform};
use crate::constants::{
    BUILD_ID_ENV, EXTENSIONS_JSON_FILE, MANIFEST_TOOL_URL_ENV, TEMPLATES_DIR,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Where the build reads inputs and writes outputs.
///
/// Every directory derives from the repository root and can be cleaned on
/// its own.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// Repository root.
    pub root: PathBuf,

    /// Project sources: `extensions.json` and project templates.
    pub source_dir: PathBuf,

    /// Root binaries directory. Each configuration publishes under `<bin>/<configId>`.
    pub bin_dir: PathBuf,

    /// Root build-temp directory: generated projects, templates, staged bundles.
    pub build_dir: PathBuf,

    /// Final archives.
    pub artifacts_dir: PathBuf,

    /// Downloaded tooling and cached archives.
    pub tools_dir: PathBuf,

    /// Committed dependency manifests and the extension baseline list.
    pub baselines_dir: PathBuf,

    /// Running under CI.
    pub is_ci: bool,

    /// Parent of per-run scratch directories.
    pub scratch_dir: PathBuf,

    /// URL of the manifest-generation utility archive.
    pub manifest_tool_url: Option<String>,

    /// Wait after deleting a directory before it is recreated.
    pub delete_settle: Duration,

    /// Extra arguments forwarded to the external build tool.
    pub passthrough: Vec<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl BuildSettings {
    /// Default layout under `root`, no environment applied.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            source_dir: root.join("src"),
            bin_dir: root.join("bin"),
            build_dir: root.join("build"),
            artifacts_dir: root.join("artifacts"),
            tools_dir: root.join("tools"),
            baselines_dir: root.join("baselines"),
            root,
            is_ci: false,
            scratch_dir: std::env::temp_dir(),
            manifest_tool_url: None,
            delete_settle: Duration::ZERO,
            passthrough: Vec::new(),
        }
    }

    /// Default layout with CI detection and tool URLs read from the environment.
    pub fn from_env(root: impl Into<PathBuf>, host: HostPlatform) -> Self {
        let mut settings = Self::new(root);
        settings.is_ci = std::env::var_os(BUILD_ID_ENV).is_some_and(|v| !v.is_empty());
        settings.manifest_tool_url = std::env::var(MANIFEST_TOOL_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty());
        if host == HostPlatform::Windows {
            settings.delete_settle = Duration::from_secs(1);
        }
        settings
    }

    /// Forward `args` to the external build tool.
    pub fn with_passthrough(mut self, args: Vec<String>) -> Self {
        self.passthrough = args;
        self
    }

    /// Extension input list.
    pub fn extensions_json(&self) -> PathBuf {
        self.source_dir.join(EXTENSIONS_JSON_FILE)
    }

    /// Project template shipped in the source directory.
    pub fn source_project(&self, file_name: &str) -> PathBuf {
        self.source_dir.join(file_name)
    }

    /// Downloaded template content.
    pub fn templates_dir(&self) -> PathBuf {
        self.build_dir.join(TEMPLATES_DIR)
    }

    /// Generated project directory for one configuration.
    pub fn project_dir(&self, id: ConfigId) -> PathBuf {
        self.build_dir.join(id.as_str())
    }

    /// Staged bundle directories.
    pub fn bundles_dir(&self) -> PathBuf {
        self.build_dir.join("bundles")
    }

    /// CDN storage layout root.
    pub fn cdn_dir(&self) -> PathBuf {
        self.build_dir.join("cdn")
    }

    /// RU package layout root.
    pub fn ru_dir(&self) -> PathBuf {
        self.build_dir.join("ru")
    }

    /// Committed dependency manifest for one configuration.
    pub fn baseline_manifest(&self, id: ConfigId) -> PathBuf {
        self.baselines_dir.join(format!("{}.deps.json", id))
    }

    /// Committed extension list.
    pub fn extension_baseline(&self) -> PathBuf {
        self.baselines_dir.join(EXTENSIONS_JSON_FILE)
    }

    /// Resolve `path` against the root unless it is absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
