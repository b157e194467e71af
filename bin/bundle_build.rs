//! `bundle-build` runs one named build pipeline.

use bundle_build::catalog::{BuildCatalog, HostPlatform};
use bundle_build::config::{BuildSettings, BundleConfiguration};
use bundle_build::http::ReqwestClient;
use bundle_build::pipeline::{BuildContext, PipelineEvent, PipelineReport};
use bundle_build::runner::ProcessRunner;
use bundle_build::targets::{create_for_target, describe_targets};
use bundle_build::{BuildError, BuildResult, Cli};
use clap::Parser;
use colored::Colorize;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        print_error(&e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> BuildResult<()> {
    if cli.list {
        return list_targets();
    }

    let target = cli.target.clone().unwrap_or_default();
    let pipeline = create_for_target(&target)?.with_events(Arc::new(print_event));

    let host = HostPlatform::current();
    let settings = BuildSettings::from_env(&cli.root, host).with_passthrough(cli.passthrough.clone());
    let bundle = BundleConfiguration::load(&cli.config_path())?;
    let catalog = BuildCatalog::for_host(host)?;

    println!(
        "\n  {} {} {} v{} on {}\n",
        "→".bright_cyan(),
        pipeline.target().bold(),
        bundle.bundle_id.bright_white(),
        bundle.bundle_version,
        host
    );
    tracing::debug!(?settings, "resolved settings");

    let mut ctx = BuildContext::new(
        settings,
        bundle,
        catalog,
        Box::new(ProcessRunner),
        Box::new(ReqwestClient::new()?),
    );
    let report = pipeline.run(&mut ctx)?;
    print_summary(&report, &ctx);
    Ok(())
}

fn list_targets() -> BuildResult<()> {
    println!();
    for (name, steps) in describe_targets()? {
        println!("  {}", name.bold());
        for step in steps {
            println!("    {} {}", "·".dimmed(), step);
        }
        println!();
    }
    Ok(())
}

fn print_event(event: PipelineEvent) {
    match event {
        PipelineEvent::StepStarted { name, index, total } => {
            println!(
                "  {} {}",
                format!("[{}/{}]", index + 1, total).dimmed(),
                name.bright_white()
            );
        }
        PipelineEvent::StepFinished { name, elapsed } => {
            println!(
                "  {} {} {}",
                "✓".bright_green(),
                name,
                format!("({:.1}s)", elapsed.as_secs_f64()).dimmed()
            );
        }
        PipelineEvent::StepFailed { name, elapsed } => {
            println!(
                "  {} {} {}",
                "✗".bright_red(),
                name,
                format!("({:.1}s)", elapsed.as_secs_f64()).dimmed()
            );
        }
    }
}

fn print_summary(report: &PipelineReport, ctx: &BuildContext) {
    println!();
    if !ctx.archives.is_empty() {
        println!("    {}:", "Artifacts".dimmed());
        for archive in &ctx.archives {
            println!(
                "      {} {}",
                archive.output_path.display().to_string().bright_white(),
                format!("({})", format_size(archive.compressed_size)).dimmed()
            );
            println!("        {} {}", "sha256".dimmed(), archive.checksum.dimmed());
        }
        println!();
    }
    println!(
        "  {} {} finished in {:.1}s\n",
        "✓".bright_green(),
        report.target.bold(),
        report.total_elapsed().as_secs_f64()
    );
}

/// Print an error with appropriate formatting based on error type.
fn print_error(e: &BuildError) {
    println!();
    let (step, e) = match e {
        BuildError::StepFailed { step, .. } => (Some(step.as_str()), e.root_cause()),
        other => (None, other),
    };
    if let Some(step) = step {
        println!("  {} step {} failed", "error".bright_red().bold(), step.bright_white());
        println!();
    }

    match e {
        BuildError::DriftDetected { label, report } => {
            println!("  {} Unapproved changes in {}", "error[drift]".bright_red().bold(), label);
            println!();
            for line in report.lines() {
                println!("    {}", line);
            }
        }
        BuildError::BindingMismatch { name, file, known } => {
            println!(
                "  {} No input extension named {}",
                "error[bindings]".bright_red().bold(),
                name.bright_white()
            );
            println!();
            println!("    {}: {}", "File".dimmed(), file.display());
            println!("    {}: {}", "Known".dimmed(), known.join(", "));
        }
        BuildError::ExternalToolFailure {
            command,
            exit_code,
            stderr,
        } => {
            println!(
                "  {} {}",
                format!("error[exit {}]", exit_code).bright_red().bold(),
                command.dimmed()
            );
            if !stderr.trim().is_empty() {
                println!();
                for line in stderr.trim().lines() {
                    println!("    {}", line);
                }
            }
        }
        BuildError::VulnerabilityFound { project, packages } => {
            println!(
                "  {} {}",
                "error[vulnerable]".bright_red().bold(),
                project.display()
            );
            println!();
            for package in packages {
                println!("    {}", package);
            }
        }
        BuildError::UnknownTarget { name, suggestion } => {
            println!("  {} unknown target {}", "error".bright_red().bold(), name.bright_white());
            if let Some(suggestion) = suggestion {
                println!();
                println!("    {}: {}", "hint".bright_blue().bold(), suggestion);
            }
            println!(
                "    {}: Run {} to see every target",
                "hint".bright_blue().bold(),
                "bundle-build --list".bright_white()
            );
        }
        // For all other errors, use a consistent styled format
        _ => {
            let msg = e.to_string();
            if let Some((prefix, rest)) = msg.split_once(": ")
                && prefix.len() < 30
                && prefix.ends_with("error")
            {
                println!(
                    "  {} {}",
                    format!("error[{}]", prefix.to_lowercase().replace(" error", ""))
                        .bright_red()
                        .bold(),
                    rest.dimmed()
                );
            } else {
                println!("  {} {}", "error".bright_red().bold(), msg);
            }
        }
    }
    println!();
}

/// Initialize tracing. Only enables logging when RUST_LOG is set or `--verbose` is passed.
fn init_tracing(verbose: bool) {
    let rust_log_set = std::env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.is_empty())
        .is_some();

    if !rust_log_set && !verbose {
        return;
    }

    let env_filter = if rust_log_set {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Format byte size.
fn format_size(bytes: u64) -> String {
    if bytes < 1_000 {
        format!("{} B", bytes)
    } else if bytes < 1_000_000 {
        format!("{:.1} KB", bytes as f64 / 1_000.0)
    } else {
        format!("{:.1} MB", bytes as f64 / 1_000_000.0)
    }
}
