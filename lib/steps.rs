//! Pipeline steps.
//!
//! Every step takes the shared [`BuildContext`] and either finishes its work
//! or returns the first error. Platform-gated steps check the catalog's host
//! and return early when it does not match.

use crate::assemble::{archive_bundle, stage_bundle};
use crate::catalog::{BuildConfiguration, HostPlatform};
use crate::cdn;
use crate::config::load_extensions;
use crate::constants::{
    DEFAULT_CDN_ENDPOINT, DEPS_MANIFEST_FILE, DOTNET, GENERATED_PROJECT_FILE, MANIFEST_TOOL_DIR,
    MANIFEST_TOOL_DLL, RESOURCES_EN_US_PATH, RESOURCES_PATH, TEMPLATES_JSON_PATH,
};
use crate::deps::{DiffOptions, compare_extension_baseline, diff_runtime_files, read_runtime_files};
use crate::error::{BuildError, BuildResult};
use crate::feed::latest_package_version;
use crate::fs::{copy_dir, copy_file, delete_dir, ensure_dir, recreate_dir};
use crate::http::download_to_file;
use crate::pack::extract_archive;
use crate::pipeline::BuildContext;
use crate::runner::run_checked;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// A vulnerable package row in `dotnet list package --vulnerable` output.
static VULNERABLE_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*>\s+(\S+)\s+(\S+)").expect("Invalid regex"));

/// Notice printed above the vulnerable package table.
const VULNERABLE_NOTICE: &str = "has the following vulnerable packages";

//--------------------------------------------------------------------------------------------------
// Functions: Directories
//--------------------------------------------------------------------------------------------------

/// Delete the binaries, build-temp and artifacts directories.
pub fn clean(ctx: &mut BuildContext) -> BuildResult<()> {
    let settle = ctx.settings.delete_settle;
    for dir in [
        &ctx.settings.bin_dir,
        &ctx.settings.build_dir,
        &ctx.settings.artifacts_dir,
    ] {
        delete_dir(dir, settle)?;
    }
    ctx.staged_bundles.clear();
    ctx.archives.clear();
    Ok(())
}

/// Delete downloaded tooling and cached archives.
pub fn clean_tools(ctx: &mut BuildContext) -> BuildResult<()> {
    delete_dir(&ctx.settings.tools_dir, ctx.settings.delete_settle)
}

/// Create every output directory.
pub fn create_directories(ctx: &mut BuildContext) -> BuildResult<()> {
    for dir in [
        &ctx.settings.bin_dir,
        &ctx.settings.build_dir,
        &ctx.settings.artifacts_dir,
        &ctx.settings.tools_dir,
    ] {
        ensure_dir(dir)?;
    }
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: Inputs
//--------------------------------------------------------------------------------------------------

/// Download the template archive and unpack it into the templates directory.
///
/// Local builds reuse an archive cached in the tools directory; CI builds
/// always download into a fresh temporary directory.
pub fn download_templates(ctx: &mut BuildContext) -> BuildResult<()> {
    let file_name = format!(
        "ExtensionBundle.v{}.Templates.{}.zip",
        ctx.bundle.bundle_major(),
        ctx.bundle.template_version
    );
    let url = format!(
        "{}/public/ExtensionBundleTemplates/{}",
        DEFAULT_CDN_ENDPOINT, file_name
    );

    let (archive, scratch) = if ctx.settings.is_ci {
        let scratch = ctx
            .settings
            .scratch_dir
            .join(uuid::Uuid::new_v4().to_string());
        (scratch.join("templates.zip"), Some(scratch))
    } else {
        (ctx.settings.tools_dir.join(&file_name), None)
    };

    let templates = ctx.settings.templates_dir();
    let extracted = fetch_templates(ctx, &url, &archive, &templates);
    if let Some(ref scratch) = scratch {
        delete_dir(scratch, Duration::ZERO)?;
    }
    tracing::debug!("extracted {} template files", extracted?);

    let templates_json = templates.join(TEMPLATES_JSON_PATH);
    if !templates_json.is_file() {
        return Err(BuildError::MissingArtifact(templates_json));
    }
    copy_file(
        &templates.join(RESOURCES_PATH),
        &templates.join(RESOURCES_EN_US_PATH),
    )?;
    Ok(())
}

fn fetch_templates(
    ctx: &BuildContext,
    url: &str,
    archive: &Path,
    templates: &Path,
) -> BuildResult<usize> {
    if archive.is_file() {
        tracing::info!("using cached templates {}", archive.display());
    } else {
        download_to_file(ctx.http.as_ref(), url, archive)?;
    }
    recreate_dir(templates, ctx.settings.delete_settle)?;
    extract_archive(archive, templates)
}

/// Copy each configuration's project template into its build directory and
/// pin every extension version.
pub fn generate_projects(ctx: &mut BuildContext) -> BuildResult<()> {
    resolve_extensions(ctx)?;

    for config in ctx.catalog.configurations() {
        let project_dir = ctx.settings.project_dir(config.config_id);
        recreate_dir(&project_dir, ctx.settings.delete_settle)?;
        copy_file(
            &ctx.settings.source_project(&config.source_project_file),
            &project_dir.join(GENERATED_PROJECT_FILE),
        )?;
    }
    Ok(())
}

/// Add every extension package to every generated project.
pub fn add_packages(ctx: &mut BuildContext) -> BuildResult<()> {
    ensure_resolved(ctx)?;

    for config in ctx.catalog.configurations() {
        let project = generated_project(ctx, config)?;
        for extension in &ctx.resolved_extensions {
            let version = extension.version.clone().unwrap_or_default();
            tracing::info!("adding {} {} to {}", extension.id, version, config.config_id);
            let args = vec![
                "add".to_string(),
                project.display().to_string(),
                "package".to_string(),
                extension.id.clone(),
                "-v".to_string(),
                version,
                "-n".to_string(),
            ];
            run_checked(ctx.runner.as_ref(), DOTNET, &args, None)?;
        }
    }
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: Build
//--------------------------------------------------------------------------------------------------

/// Publish every configuration and copy its binaries to the publish-bin directory.
pub fn build_binaries(ctx: &mut BuildContext) -> BuildResult<()> {
    for config in ctx.catalog.configurations() {
        let project = generated_project(ctx, config)?;
        let publish_out = ctx.settings.project_dir(config.config_id).join("publish");
        let args = publish_args(config, &project, &publish_out, &ctx.settings.passthrough);
        run_checked(ctx.runner.as_ref(), DOTNET, &args, None)?;

        let produced = publish_out.join("bin");
        if !produced.is_dir() {
            return Err(BuildError::MissingArtifact(produced));
        }
        let target = config.publish_bin_directory(&ctx.settings.bin_dir);
        recreate_dir(&target, ctx.settings.delete_settle)?;
        let count = copy_dir(&produced, &target)?;
        tracing::info!("published {} files for {}", count, config.config_id);
    }
    Ok(())
}

/// `dotnet publish` arguments for one configuration.
pub fn publish_args(
    config: &BuildConfiguration,
    project: &Path,
    output: &Path,
    passthrough: &[String],
) -> Vec<String> {
    let mut args = vec![
        "publish".to_string(),
        project.display().to_string(),
        "-c".to_string(),
        "Release".to_string(),
        "-o".to_string(),
        output.display().to_string(),
    ];
    if !config.is_portable() {
        args.extend([
            "-r".to_string(),
            config.runtime_identifier.clone(),
            "--self-contained".to_string(),
            "false".to_string(),
        ]);
    }
    if config.publish_ahead_of_time {
        args.push("-p:PublishReadyToRun=true".to_string());
    }
    args.extend(passthrough.iter().cloned());
    args
}

//--------------------------------------------------------------------------------------------------
// Functions: Validation
//--------------------------------------------------------------------------------------------------

/// Compare the extension list with the committed baseline list.
pub fn validate_extensions(ctx: &mut BuildContext) -> BuildResult<()> {
    let current = load_extensions(&ctx.settings.extensions_json())?;
    let baseline = load_extensions(&ctx.settings.extension_baseline())?;
    compare_extension_baseline(&current, &baseline)
        .into_gate("extensions.json", &ctx.bundle.reviewers)
}

/// Compare every configuration's dependency manifest with its committed baseline.
///
/// All configurations are compared before failing so one run reports every drift.
pub fn validate_dependencies(ctx: &mut BuildContext) -> BuildResult<()> {
    let options = DiffOptions::new(ctx.bundle.dependency_policy);
    let mut labels = Vec::new();
    let mut reports = Vec::new();

    for config in ctx.catalog.configurations() {
        let fallbacks = config.rid_fallbacks();
        let baseline = read_runtime_files(&ctx.settings.baseline_manifest(config.config_id), fallbacks)?;
        let current = read_runtime_files(
            &config
                .publish_bin_directory(&ctx.settings.bin_dir)
                .join(DEPS_MANIFEST_FILE),
            fallbacks,
        )?;

        let diff = diff_runtime_files(&baseline, &current, &options);
        if diff.is_acceptable() {
            tracing::info!("{}: no dependency drift ({})", config.config_id, options.mode);
            continue;
        }
        labels.push(config.config_id.to_string());
        reports.push(diff.render_report(config.config_id.as_str(), &ctx.bundle.reviewers));
    }

    if reports.is_empty() {
        return Ok(());
    }
    Err(BuildError::DriftDetected {
        label: labels.join(", "),
        report: reports.join("\n\n"),
    })
}

/// Fail when any generated project has a known-vulnerable dependency.
pub fn scan_vulnerabilities(ctx: &mut BuildContext) -> BuildResult<()> {
    for config in ctx.catalog.configurations() {
        let project = generated_project(ctx, config)?;
        let args = vec![
            "list".to_string(),
            project.display().to_string(),
            "package".to_string(),
            "--vulnerable".to_string(),
            "--include-transitive".to_string(),
        ];
        let output = run_checked(ctx.runner.as_ref(), DOTNET, &args, None)?;
        let packages = parse_vulnerable_packages(&output.stdout);
        if !packages.is_empty() {
            return Err(BuildError::VulnerabilityFound { project, packages });
        }
        tracing::info!("{}: no vulnerable packages", config.config_id);
    }
    Ok(())
}

/// Vulnerable package rows from `dotnet list package --vulnerable` output.
pub fn parse_vulnerable_packages(output: &str) -> Vec<String> {
    let rows: Vec<String> = output
        .lines()
        .filter(|line| VULNERABLE_ROW.is_match(line))
        .map(|line| line.trim().trim_start_matches('>').trim().to_string())
        .collect();
    if !rows.is_empty() {
        return rows;
    }
    output
        .lines()
        .filter(|line| line.contains(VULNERABLE_NOTICE))
        .map(|line| line.trim().to_string())
        .collect()
}

//--------------------------------------------------------------------------------------------------
// Functions: Packaging
//--------------------------------------------------------------------------------------------------

/// Stage a bundle directory for every package.
pub fn stage_bundles(ctx: &mut BuildContext) -> BuildResult<()> {
    ensure_resolved(ctx)?;
    ctx.staged_bundles.clear();
    for package in ctx.catalog.packages() {
        let staged = stage_bundle(
            &ctx.settings,
            &ctx.bundle,
            &ctx.catalog,
            package,
            &ctx.resolved_extensions,
        )?;
        ctx.staged_bundles.push(staged);
    }
    Ok(())
}

/// Generate a software bill of materials inside every staged bundle.
///
/// Skipped when no utility URL is configured.
pub fn generate_manifest(ctx: &mut BuildContext) -> BuildResult<()> {
    let Some(url) = ctx.settings.manifest_tool_url.clone() else {
        tracing::warn!("manifest tool URL not set, skipping manifest generation");
        return Ok(());
    };

    let tool_dir = ctx.settings.tools_dir.join(MANIFEST_TOOL_DIR);
    let tool = tool_dir.join(MANIFEST_TOOL_DLL);
    if !tool.is_file() {
        let archive = ctx.settings.tools_dir.join(format!("{}.zip", MANIFEST_TOOL_DIR));
        download_to_file(ctx.http.as_ref(), &url, &archive)?;
        extract_archive(&archive, &tool_dir)?;
        if !tool.is_file() {
            return Err(BuildError::MissingArtifact(tool));
        }
    }

    for staged in &ctx.staged_bundles {
        let dir = staged.directory.display().to_string();
        let args = vec![
            tool.display().to_string(),
            "generate".to_string(),
            "-BuildDropPath".to_string(),
            dir.clone(),
            "-BuildComponentPath".to_string(),
            dir,
            "-PackageName".to_string(),
            staged.bundle_name.clone(),
            "-PackageVersion".to_string(),
            ctx.bundle.bundle_version.clone(),
        ];
        run_checked(ctx.runner.as_ref(), DOTNET, &args, None)?;
    }
    Ok(())
}

/// Archive every staged bundle.
pub fn archive_bundles(ctx: &mut BuildContext) -> BuildResult<()> {
    if ctx.staged_bundles.is_empty() {
        stage_bundles(ctx)?;
    }
    for staged in &ctx.staged_bundles {
        let result = archive_bundle(&ctx.settings, &ctx.bundle, staged)?;
        tracing::info!(
            "created {} ({} files, {} bytes)",
            result.output_path.display(),
            result.file_count,
            result.compressed_size
        );
        ctx.archives.push(result);
    }
    Ok(())
}

/// Lay out and zip the CDN storage tree for every endpoint.
pub fn create_cdn_package(ctx: &mut BuildContext) -> BuildResult<()> {
    let (archives, primary) = package_archives(ctx)?;
    let results = cdn::create_cdn_package(
        ctx.http.as_ref(),
        &ctx.settings,
        &ctx.bundle,
        &archives,
        &primary,
    )?;
    ctx.archives.extend(results);
    Ok(())
}

/// Build the RU distribution. Windows hosts only.
pub fn create_ru_package(ctx: &mut BuildContext) -> BuildResult<()> {
    if ctx.catalog.host() != HostPlatform::Windows {
        tracing::warn!("RU package is only built on Windows hosts, skipping");
        return Ok(());
    }
    let (_, primary) = package_archives(ctx)?;
    let result = cdn::create_ru_package(&ctx.settings, &ctx.bundle, &primary)?;
    ctx.archives.push(result);
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Load the extension list and pin unversioned entries from the package feed.
fn resolve_extensions(ctx: &mut BuildContext) -> BuildResult<()> {
    let mut extensions = load_extensions(&ctx.settings.extensions_json())?;
    for extension in &mut extensions {
        if extension.version.is_none() {
            let version = latest_package_version(
                ctx.http.as_ref(),
                &ctx.bundle.package_feed,
                &extension.id,
                extension.major_version,
                false,
            )?;
            tracing::info!("resolved {} to {}", extension.id, version);
            extension.version = Some(version);
        }
    }
    ctx.resolved_extensions = extensions;
    Ok(())
}

fn ensure_resolved(ctx: &mut BuildContext) -> BuildResult<()> {
    if ctx.resolved_extensions.is_empty() {
        resolve_extensions(ctx)?;
    }
    Ok(())
}

fn generated_project(ctx: &BuildContext, config: &BuildConfiguration) -> BuildResult<PathBuf> {
    let project = ctx
        .settings
        .project_dir(config.config_id)
        .join(GENERATED_PROJECT_FILE);
    if !project.is_file() {
        return Err(BuildError::MissingArtifact(project));
    }
    Ok(project)
}

/// Every package archive, plus the primary package's archive.
fn package_archives(ctx: &BuildContext) -> BuildResult<(Vec<PathBuf>, PathBuf)> {
    let mut archives = Vec::new();
    for package in ctx.catalog.packages() {
        let path = package.zip_file_path(&ctx.bundle, &ctx.settings.artifacts_dir);
        if !path.is_file() {
            return Err(BuildError::MissingArtifact(path));
        }
        archives.push(path);
    }
    let primary = ctx
        .catalog
        .primary_package()
        .map(|p| p.zip_file_path(&ctx.bundle, &ctx.settings.artifacts_dir))
        .ok_or_else(|| BuildError::InvalidCatalog("catalog has no packages".into()))?;
    Ok((archives, primary))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests;
