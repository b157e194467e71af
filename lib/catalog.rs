//! Build configuration matrix.
//!
//! Each host platform has its own catalog of configurations to publish and
//! packages to assemble from them. Ahead-of-time configurations only appear
//! on the host whose OS they target.

use crate::config::BundleConfiguration;
use crate::error::{BuildError, BuildResult};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A platform + architecture + runtime combination to publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigId {
    /// Platform-agnostic intermediate code.
    AnyAny,
    /// Windows 32-bit, ahead-of-time compiled.
    WinX86,
    /// Windows 64-bit, ahead-of-time compiled.
    WinX64,
    /// Linux 64-bit, ahead-of-time compiled.
    LinuxX64,
}

/// Operating system the build runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Windows,
    Linux,
    MacOs,
}

/// One entry of the build matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfiguration {
    /// Unique id, also the publish directory name.
    pub config_id: ConfigId,

    /// Project template file name in the source directory.
    pub source_project_file: String,

    /// Target runtime identifier (`any` for platform-agnostic output).
    pub runtime_identifier: String,

    /// Request ahead-of-time compilation.
    pub publish_ahead_of_time: bool,

    /// Where the output lands under a bundle (`bin`, `bin_v3/win-x64`).
    pub output_bin_sub_path: String,
}

/// A bundle archive assembled from one or more configurations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundlePackageConfiguration {
    /// Package suffix. Empty for the default package.
    pub package_identifier: String,

    /// Configurations whose binaries go into the bundle.
    pub configs_to_include: Vec<ConfigId>,

    /// Project file copied into the bundle for provenance.
    pub project_file: String,
}

/// Validated build matrix for one host.
#[derive(Debug, Clone)]
pub struct BuildCatalog {
    host: HostPlatform,
    configurations: Vec<BuildConfiguration>,
    packages: Vec<BundlePackageConfiguration>,
}

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Project template for platform-agnostic builds.
pub const PROJECT_FILE: &str = "extensions.csproj";

/// Project template for ahead-of-time builds.
pub const READY_TO_RUN_PROJECT_FILE: &str = "extensions.readytorun.csproj";

/// Runtime identifier sentinel for platform-agnostic output.
pub const ANY_RUNTIME: &str = "any";

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ConfigId {
    /// Every configuration id.
    pub const ALL: [ConfigId; 4] = [
        ConfigId::AnyAny,
        ConfigId::WinX86,
        ConfigId::WinX64,
        ConfigId::LinuxX64,
    ];

    /// Directory-safe name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigId::AnyAny => "any_any",
            ConfigId::WinX86 => "win_x86",
            ConfigId::WinX64 => "win_x64",
            ConfigId::LinuxX64 => "linux_x64",
        }
    }
}

impl HostPlatform {
    /// Platform this process runs on.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            HostPlatform::Windows
        } else if cfg!(target_os = "macos") {
            HostPlatform::MacOs
        } else {
            HostPlatform::Linux
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HostPlatform::Windows => "windows",
            HostPlatform::Linux => "linux",
            HostPlatform::MacOs => "macos",
        }
    }
}

impl BuildConfiguration {
    fn any() -> Self {
        Self {
            config_id: ConfigId::AnyAny,
            source_project_file: PROJECT_FILE.to_string(),
            runtime_identifier: ANY_RUNTIME.to_string(),
            publish_ahead_of_time: false,
            output_bin_sub_path: "bin".to_string(),
        }
    }

    fn ready_to_run(config_id: ConfigId, rid: &str) -> Self {
        Self {
            config_id,
            source_project_file: READY_TO_RUN_PROJECT_FILE.to_string(),
            runtime_identifier: rid.to_string(),
            publish_ahead_of_time: true,
            output_bin_sub_path: format!("bin_v3/{}", rid),
        }
    }

    /// `<root_bin>/<configId>`.
    pub fn publish_directory(&self, root_bin: &Path) -> PathBuf {
        root_bin.join(self.config_id.as_str())
    }

    /// `<root_bin>/<configId>/<outputBinSubPath>`.
    pub fn publish_bin_directory(&self, root_bin: &Path) -> PathBuf {
        join_sub_path(&self.publish_directory(root_bin), &self.output_bin_sub_path)
    }

    /// Whether the output is platform-agnostic.
    pub fn is_portable(&self) -> bool {
        self.runtime_identifier.eq_ignore_ascii_case(ANY_RUNTIME)
    }

    /// Runtime identifiers to try when picking asset groups, most specific first.
    ///
    /// Platform-agnostic output has none and always takes the default group.
    pub fn rid_fallbacks(&self) -> &'static [&'static str] {
        match self.runtime_identifier.as_str() {
            "win-x64" => &["win-x64", "win", "any", "base"],
            "win-x86" => &["win-x86", "win", "any", "base"],
            "linux-x64" => &["linux-x64", "linux", "unix", "any", "base"],
            _ => &[],
        }
    }
}

impl BundlePackageConfiguration {
    fn new(package_identifier: &str, configs: &[ConfigId], project_file: &str) -> Self {
        Self {
            package_identifier: package_identifier.to_string(),
            configs_to_include: configs.to_vec(),
            project_file: project_file.to_string(),
        }
    }

    /// `<bundleId>.<bundleVersion>_<packageIdentifier>` with a bare trailing `_` trimmed.
    pub fn bundle_name(&self, bundle: &BundleConfiguration) -> String {
        format!(
            "{}.{}_{}",
            bundle.bundle_id, bundle.bundle_version, self.package_identifier
        )
        .trim_matches('_')
        .to_string()
    }

    /// Archive file name.
    pub fn zip_file_name(&self, bundle: &BundleConfiguration) -> String {
        format!("{}.zip", self.bundle_name(bundle))
    }

    /// Archive path under `artifacts_dir`.
    pub fn zip_file_path(&self, bundle: &BundleConfiguration, artifacts_dir: &Path) -> PathBuf {
        artifacts_dir.join(self.zip_file_name(bundle))
    }

    /// The default (un-suffixed) package.
    pub fn is_default(&self) -> bool {
        self.package_identifier.is_empty()
    }
}

impl BuildCatalog {
    /// Validate and build a catalog.
    pub fn new(
        host: HostPlatform,
        configurations: Vec<BuildConfiguration>,
        packages: Vec<BundlePackageConfiguration>,
    ) -> BuildResult<Self> {
        let mut ids = HashSet::new();
        let mut bin_paths = HashSet::new();
        for config in &configurations {
            if !ids.insert(config.config_id) {
                return Err(BuildError::InvalidCatalog(format!(
                    "configuration {} is defined more than once",
                    config.config_id
                )));
            }
            if escapes_root(&config.output_bin_sub_path) {
                return Err(BuildError::InvalidCatalog(format!(
                    "configuration {} has bin path {} outside its publish directory",
                    config.config_id, config.output_bin_sub_path
                )));
            }
            let bin_path = normalize(&format!(
                "{}/{}",
                config.config_id, config.output_bin_sub_path
            ));
            if !bin_paths.insert(bin_path.clone()) {
                return Err(BuildError::InvalidCatalog(format!(
                    "configuration {} publishes to {} which is already taken",
                    config.config_id, bin_path
                )));
            }
        }

        let mut package_ids = HashSet::new();
        for package in &packages {
            if !package_ids.insert(package.package_identifier.to_ascii_lowercase()) {
                return Err(BuildError::InvalidCatalog(format!(
                    "package '{}' is defined more than once",
                    package.package_identifier
                )));
            }

            let mut sub_paths = HashSet::new();
            for id in &package.configs_to_include {
                let config = configurations
                    .iter()
                    .find(|c| c.config_id == *id)
                    .ok_or_else(|| {
                        BuildError::InvalidCatalog(format!(
                            "package '{}' includes {} which is not in the catalog",
                            package.package_identifier, id
                        ))
                    })?;
                if !sub_paths.insert(normalize(&config.output_bin_sub_path)) {
                    return Err(BuildError::InvalidCatalog(format!(
                        "package '{}' places more than one configuration at {}",
                        package.package_identifier, config.output_bin_sub_path
                    )));
                }
            }
        }

        Ok(Self {
            host,
            configurations,
            packages,
        })
    }

    /// Catalog for `host`.
    pub fn for_host(host: HostPlatform) -> BuildResult<Self> {
        let any = BuildConfiguration::any();
        match host {
            HostPlatform::Windows => Self::new(
                host,
                vec![
                    any,
                    BuildConfiguration::ready_to_run(ConfigId::WinX86, "win-x86"),
                    BuildConfiguration::ready_to_run(ConfigId::WinX64, "win-x64"),
                ],
                vec![
                    BundlePackageConfiguration::new(
                        "",
                        &[ConfigId::AnyAny, ConfigId::WinX86, ConfigId::WinX64],
                        PROJECT_FILE,
                    ),
                    BundlePackageConfiguration::new(
                        "win-x86",
                        &[ConfigId::WinX86],
                        READY_TO_RUN_PROJECT_FILE,
                    ),
                    BundlePackageConfiguration::new(
                        "win-x64",
                        &[ConfigId::WinX64],
                        READY_TO_RUN_PROJECT_FILE,
                    ),
                ],
            ),
            HostPlatform::Linux => Self::new(
                host,
                vec![
                    any,
                    BuildConfiguration::ready_to_run(ConfigId::LinuxX64, "linux-x64"),
                ],
                vec![BundlePackageConfiguration::new(
                    "linux-x64",
                    &[ConfigId::AnyAny, ConfigId::LinuxX64],
                    READY_TO_RUN_PROJECT_FILE,
                )],
            ),
            HostPlatform::MacOs => Self::new(
                host,
                vec![any],
                vec![BundlePackageConfiguration::new(
                    "",
                    &[ConfigId::AnyAny],
                    PROJECT_FILE,
                )],
            ),
        }
    }

    /// Host this catalog was built for.
    pub fn host(&self) -> HostPlatform {
        self.host
    }

    /// Configurations in publish order.
    pub fn configurations(&self) -> &[BuildConfiguration] {
        &self.configurations
    }

    /// Packages in assembly order.
    pub fn packages(&self) -> &[BundlePackageConfiguration] {
        &self.packages
    }

    /// Look up a configuration.
    pub fn get(&self, id: ConfigId) -> Option<&BuildConfiguration> {
        self.configurations.iter().find(|c| c.config_id == id)
    }

    /// The package used for the RU and CDN distributions: the default
    /// package when present, otherwise the first one.
    pub fn primary_package(&self) -> Option<&BundlePackageConfiguration> {
        self.packages
            .iter()
            .find(|p| p.is_default())
            .or_else(|| self.packages.first())
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Join a `/`-separated sub path onto `base`.
pub fn join_sub_path(base: &Path, sub_path: &str) -> PathBuf {
    sub_path
        .split(['/', '\\'])
        .filter(|s| !s.is_empty())
        .fold(base.to_path_buf(), |acc, part| acc.join(part))
}

/// Rooted paths and `..` segments would leave the directory they are joined onto.
fn escapes_root(sub_path: &str) -> bool {
    sub_path.starts_with(['/', '\\'])
        || sub_path.contains(':')
        || sub_path.split(['/', '\\']).any(|s| s == "..")
}

fn normalize(sub_path: &str) -> String {
    sub_path
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
        .to_ascii_lowercase()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
