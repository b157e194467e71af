//! Error types for bundle-build.

use std::path::PathBuf;
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Result type for bundle-build operations.
pub type BuildResult<T> = Result<T, BuildError>;

/// Error type for bundle-build operations.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Dependency manifest (or another required input file) does not exist.
    #[error("manifest not found: {}", .0.display())]
    ManifestNotFound(PathBuf),

    /// Dependency manifest exists but is malformed.
    #[error("failed to parse manifest {}: {message}", path.display())]
    ManifestParse {
        /// Manifest path.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// Unapproved dependency drift. The report is meant for human review.
    #[error("dependency drift detected in {label}")]
    DriftDetected {
        /// What was compared (configuration id or file).
        label: String,
        /// Rendered change report.
        report: String,
    },

    /// An output extension entry has no matching input extension.
    #[error(
        "no input extension named '{name}' for entry in {}; known extensions: {}",
        file.display(),
        known.join(", ")
    )]
    BindingMismatch {
        /// Unmatched extension name.
        name: String,
        /// The extensions.json that contained it.
        file: PathBuf,
        /// Every input extension name.
        known: Vec<String>,
    },

    /// External tool exited with a non-zero status.
    #[error("`{command}` failed with exit code {exit_code}")]
    ExternalToolFailure {
        /// Full command line.
        command: String,
        /// Exit code (-1 when terminated by a signal).
        exit_code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// Non-2xx response while downloading.
    #[error("download of {url} failed: HTTP {status}")]
    DownloadFailure {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// Vulnerability scan reported vulnerable packages.
    #[error("vulnerable packages found in {}", project.display())]
    VulnerabilityFound {
        /// Scanned project.
        project: PathBuf,
        /// Offending package rows.
        packages: Vec<String>,
    },

    /// A pipeline step failed.
    #[error("step '{step}' failed: {source}")]
    StepFailed {
        /// Step name as registered.
        step: String,
        /// Underlying failure.
        #[source]
        source: Box<BuildError>,
    },

    /// No pipeline registered under this name.
    #[error("unknown target '{name}'")]
    UnknownTarget {
        /// Requested target.
        name: String,
        /// Closest known target names.
        suggestion: Option<String>,
    },

    /// Build catalog authoring error.
    #[error("invalid build catalog: {0}")]
    InvalidCatalog(String),

    /// The package feed had no version for the requested major.
    #[error("no version of {package} with major version {major} found on feed")]
    PackageVersionNotFound {
        /// Package id.
        package: String,
        /// Requested major version.
        major: u64,
    },

    /// The external tool finished but did not produce the expected output.
    #[error("expected build output not found: {}", .0.display())]
    MissingArtifact(PathBuf),

    /// Configuration parse error.
    #[error("failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Zip error.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Walkdir error.
    #[error("Walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Path strip error.
    #[error("Path error: {0}")]
    StripPrefix(#[from] std::path::StripPrefixError),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl BuildError {
    /// Wrap this error with the name of the step it escaped from.
    pub fn in_step(self, step: impl Into<String>) -> Self {
        BuildError::StepFailed {
            step: step.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through step wrappers.
    pub fn root_cause(&self) -> &BuildError {
        match self {
            BuildError::StepFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl From<anyhow::Error> for BuildError {
    fn from(err: anyhow::Error) -> Self {
        BuildError::Generic(format!("{:#}", err))
    }
}
