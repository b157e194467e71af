//! Named pipeline variants.
//!
//! One pipeline is active per invocation; the target name passed on the
//! command line picks it.

use crate::error::{BuildError, BuildResult};
use crate::pipeline::Pipeline;
use crate::steps;
use crate::suggest::{find_similar, format_suggestions};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Full build: compile, gate, package.
pub const BUILD: &str = "build";

/// Approval gates only, over existing build output.
pub const VALIDATE: &str = "validate";

/// Packaging only, over existing build output.
pub const PACKAGE: &str = "package";

/// Template download only.
pub const TEMPLATES: &str = "templates";

/// Remove build output and downloaded tooling.
pub const CLEAN: &str = "clean";

/// Every target, in the order `--list` prints them.
pub const TARGETS: &[&str] = &[BUILD, VALIDATE, PACKAGE, TEMPLATES, CLEAN];

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Build the pipeline registered under `name`. Matching ignores case.
pub fn create_for_target(name: &str) -> BuildResult<Pipeline> {
    let target = name.trim().to_ascii_lowercase();
    let pipeline = match target.as_str() {
        BUILD => Pipeline::new(BUILD)
            .then("clean", steps::clean)
            .then("create-directories", steps::create_directories)
            .then("download-templates", steps::download_templates)
            .then("generate-projects", steps::generate_projects)
            .then("add-packages", steps::add_packages)
            .then("build-binaries", steps::build_binaries)
            .then("validate-dependencies", steps::validate_dependencies)
            .then("scan-vulnerabilities", steps::scan_vulnerabilities)
            .then("stage-bundles", steps::stage_bundles)
            .then("generate-manifest", steps::generate_manifest)
            .then("archive-bundles", steps::archive_bundles)
            .then("create-cdn-package", steps::create_cdn_package)
            .then("create-ru-package", steps::create_ru_package),
        VALIDATE => Pipeline::new(VALIDATE)
            .then("validate-extensions", steps::validate_extensions)
            .then("validate-dependencies", steps::validate_dependencies),
        PACKAGE => Pipeline::new(PACKAGE)
            .then("stage-bundles", steps::stage_bundles)
            .then("archive-bundles", steps::archive_bundles)
            .then("create-cdn-package", steps::create_cdn_package)
            .then("create-ru-package", steps::create_ru_package),
        TEMPLATES => Pipeline::new(TEMPLATES).then("download-templates", steps::download_templates),
        CLEAN => Pipeline::new(CLEAN)
            .then("clean", steps::clean)
            .then("clean-tools", steps::clean_tools),
        _ => {
            return Err(BuildError::UnknownTarget {
                name: name.to_string(),
                suggestion: format_suggestions(&find_similar(&target, TARGETS)),
            });
        }
    };
    Ok(pipeline)
}

/// Every target with its step names, for `--list`.
pub fn describe_targets() -> BuildResult<Vec<(&'static str, Vec<String>)>> {
    TARGETS
        .iter()
        .map(|name| {
            let pipeline = create_for_target(name)?;
            let steps = pipeline
                .step_names()
                .into_iter()
                .map(str::to_string)
                .collect();
            Ok((*name, steps))
        })
        .collect()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
