//! CLI command definitions.

use crate::constants::{BUNDLE_CONFIG_FILE, ROOT_DIR_ENV};
use clap::Parser;
use clap::builder::styling::{AnsiColor, Color, Style, Styles};
use std::path::PathBuf;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const CLI_EXAMPLES: &str = "\
Examples:
  bundle-build build                          Full build for this host
  bundle-build build -- --no-restore          Forward arguments to every publish
  bundle-build validate                       Run the approval gates only
  bundle-build package --root ../bundle       Package existing build output
  bundle-build --list                         List targets and their steps

Environment:
  BUNDLE_BUILD_ROOT   Repository root (same as --root)
  BUILD_BUILDID       Marks a CI build (templates are never cached)
  MANIFEST_TOOL_URL   Manifest utility archive; manifest generation is skipped when unset
  RUST_LOG            Log filter (e.g. debug)";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// bundle-build - Build, validate and package extension bundles.
#[derive(Debug, Parser)]
#[command(name = "bundle-build", author, version, styles=styles())]
#[command(
    about = "Build, validate and package extension bundles",
    after_help = CLI_EXAMPLES
)]
pub struct Cli {
    /// Target to run (build, validate, package, templates, clean).
    #[arg(required_unless_present = "list")]
    pub target: Option<String>,

    /// Repository root.
    #[arg(long, env = ROOT_DIR_ENV, default_value = ".")]
    pub root: PathBuf,

    /// Bundle configuration file (defaults to bundleConfig.json in the root).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// List targets and their steps.
    #[arg(short, long)]
    pub list: bool,

    /// Log step progress (same as RUST_LOG=info).
    #[arg(short, long)]
    pub verbose: bool,

    /// Arguments forwarded to every publish invocation.
    #[arg(last = true, allow_hyphen_values = true)]
    pub passthrough: Vec<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Cli {
    /// Bundle configuration path, resolved against the root when relative.
    pub fn config_path(&self) -> PathBuf {
        match &self.config {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.root.join(path),
            None => self.root.join(BUNDLE_CONFIG_FILE),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

pub fn styles() -> Styles {
    Styles::styled()
        .header(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Yellow))),
        )
        .usage(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .invalid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .valid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_target_and_passthrough() {
        let cli = Cli::try_parse_from([
            "bundle-build",
            "build",
            "--root",
            "/repo",
            "--",
            "--no-restore",
            "-p:Foo=1",
        ])
        .unwrap();

        assert_eq!(cli.target.as_deref(), Some("build"));
        assert_eq!(cli.root, PathBuf::from("/repo"));
        assert_eq!(cli.passthrough, vec!["--no-restore", "-p:Foo=1"]);
        assert_eq!(cli.config_path(), PathBuf::from("/repo/bundleConfig.json"));
    }

    #[test]
    fn test_relative_config_resolves_against_root() {
        let cli =
            Cli::try_parse_from(["bundle-build", "validate", "--root", "/repo", "--config", "cfg/b.json"])
                .unwrap();
        assert_eq!(cli.config_path(), PathBuf::from("/repo/cfg/b.json"));
    }

    #[test]
    fn test_target_required_without_list() {
        assert!(Cli::try_parse_from(["bundle-build"]).is_err());

        let cli = Cli::try_parse_from(["bundle-build", "--list"]).unwrap();
        assert!(cli.list);
        assert!(cli.target.is_none());
    }
}
