//! Dependency manifests: reading, comparison and approval gates.

mod baseline;
mod diff;
mod reader;
mod types;


//--------------------------------------------------------------------------------------------------
// Re-Exports
//--------------------------------------------------------------------------------------------------

pub use baseline::{ExtensionBaselineReport, MajorVersionChange, compare_extension_baseline};
pub use diff::{ChangedFile, DiffMode, DiffOptions, ManifestDiff, diff_runtime_files};
pub use reader::{load_manifest, read_runtime_files, select_runtime_files, sort_by_file_name};
pub use types::{AssetGroup, DependencyManifest, RuntimeFile, RuntimeLibrary, parse_major};
