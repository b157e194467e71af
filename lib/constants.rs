//! Constants for bundle-build.
//!
//! File names, environment variables and endpoints shared across the
//! build steps. Directory layout lives in [`crate::config::BuildSettings`].

//--------------------------------------------------------------------------------------------------
// Constants: Files
//--------------------------------------------------------------------------------------------------

/// Default bundle configuration file, relative to the repository root.
pub const BUNDLE_CONFIG_FILE: &str = "bundleConfig.json";

/// Extension input list (and the runtime-generated extension list in published output).
pub const EXTENSIONS_JSON_FILE: &str = "extensions.json";

/// Bundle identity file written at the bundle root.
pub const BUNDLE_JSON_FILE: &str = "bundle.json";

/// Dependency manifest emitted next to published binaries.
pub const DEPS_MANIFEST_FILE: &str = "extensions.deps.json";

/// Name every generated project file gets inside its build directory.
pub const GENERATED_PROJECT_FILE: &str = "extensions.csproj";

/// CDN version index.
pub const INDEX_FILE: &str = "index.json";

/// CDN resource index.
pub const INDEX_V2_FILE: &str = "index-v2.json";

/// Directory holding template content inside a bundle.
pub const TEMPLATES_DIR: &str = "StaticContent";

/// Template list the download step must produce, relative to [`TEMPLATES_DIR`].
pub const TEMPLATES_JSON_PATH: &str = "v1/templates/templates.json";

/// Neutral resources file, relative to [`TEMPLATES_DIR`].
pub const RESOURCES_PATH: &str = "v1/resources/Resources.json";

/// Default-locale copy of the resources file, relative to [`TEMPLATES_DIR`].
pub const RESOURCES_EN_US_PATH: &str = "v1/resources/Resources.en-US.json";

//--------------------------------------------------------------------------------------------------
// Constants: Environment
//--------------------------------------------------------------------------------------------------

/// Environment variable for the repository root.
pub const ROOT_DIR_ENV: &str = "BUNDLE_BUILD_ROOT";

/// Set by the CI system; its presence marks a CI build.
pub const BUILD_ID_ENV: &str = "BUILD_BUILDID";

/// SAS URL of the manifest-generation utility archive.
pub const MANIFEST_TOOL_URL_ENV: &str = "MANIFEST_TOOL_URL";

//--------------------------------------------------------------------------------------------------
// Constants: Endpoints & Policy
//--------------------------------------------------------------------------------------------------

/// Public CDN hosting templates and bundle indexes.
pub const DEFAULT_CDN_ENDPOINT: &str = "https://functionscdn.azureedge.net";

/// Flat-container package feed used to resolve extension versions.
pub const DEFAULT_PACKAGE_FEED: &str = "https://api.nuget.org/v3-flatcontainer";

/// External compiler/packager executable.
pub const DOTNET: &str = "dotnet";

/// People who must approve dependency drift.
pub const DEFAULT_REVIEWERS: &[&str] = &["@extension-bundle-owners"];

/// Files intentionally shipped without an assembly version.
pub const UNVERSIONED_SHIMS: &[&str] = &["extensions.dll"];

/// Directory under the tools directory holding the manifest-generation utility.
pub const MANIFEST_TOOL_DIR: &str = "manifest-tool";

/// Entry assembly of the manifest-generation utility.
pub const MANIFEST_TOOL_DLL: &str = "Microsoft.ManifestTool.dll";
