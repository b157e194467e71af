//! Build configuration: bundle identity, extension inputs and directory layout.

mod bundle;
mod extension;
mod settings;

//--------------------------------------------------------------------------------------------------
// Re-Exports
//--------------------------------------------------------------------------------------------------

pub use bundle::{BundleConfiguration, BundleIdentity};
pub use extension::{Extension, load_extensions};
pub use settings::BuildSettings;
