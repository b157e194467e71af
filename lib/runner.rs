//! External process invocation.

use crate::error::{BuildError, BuildResult};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (-1 when terminated by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,
}

/// Runs external tools to completion.
pub trait CommandRunner {
    /// Run `program` with `args`, blocking until it exits.
    ///
    /// A non-zero exit is not an error here; see [`run_checked`].
    fn run(&self, program: &str, args: &[String], cwd: Option<&Path>) -> BuildResult<CommandOutput>;
}

/// [`CommandRunner`] backed by real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl CommandOutput {
    /// Whether the process exited with 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl CommandRunner for ProcessRunner {
    fn run(&self, program: &str, args: &[String], cwd: Option<&Path>) -> BuildResult<CommandOutput> {
        let start = Instant::now();
        tracing::debug!("running {}", command_line(program, args));

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|e| {
            BuildError::Generic(format!("failed to start `{}`: {}", program, e))
        })?;

        let result = CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        tracing::debug!(
            exit_code = result.exit_code,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "{} finished",
            program
        );
        Ok(result)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Run a command and fail with [`BuildError::ExternalToolFailure`] on a non-zero exit.
pub fn run_checked(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
) -> BuildResult<CommandOutput> {
    let output = runner.run(program, args, cwd)?;
    if !output.success() {
        let stderr = if output.stderr.trim().is_empty() {
            // dotnet reports most build errors on stdout.
            output.stdout.clone()
        } else {
            output.stderr.clone()
        };
        return Err(BuildError::ExternalToolFailure {
            command: command_line(program, args),
            exit_code: output.exit_code,
            stderr,
        });
    }
    Ok(output)
}

/// Printable command line. Arguments with spaces are quoted.
pub fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program.to_string())
        .chain(args.iter().map(|a| {
            if a.contains(' ') {
                format!("\"{}\"", a)
            } else {
                a.clone()
            }
        }))
        .collect::<Vec<_>>()
        .join(" ")
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRunner;

    #[test]
    fn test_command_line_quotes_spaces() {
        let args = vec!["publish".to_string(), "my project.csproj".to_string()];
        assert_eq!(
            command_line("dotnet", &args),
            "dotnet publish \"my project.csproj\""
        );
    }

    #[test]
    fn test_run_checked_maps_failure() {
        let runner = FakeRunner::new();
        runner.respond("publish", 3, "", "boom");

        let err = run_checked(&runner, "dotnet", &["publish".to_string()], None).unwrap_err();
        match err {
            BuildError::ExternalToolFailure {
                command,
                exit_code,
                stderr,
            } => {
                assert_eq!(command, "dotnet publish");
                assert_eq!(exit_code, 3);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_run_checked_falls_back_to_stdout() {
        let runner = FakeRunner::new();
        runner.respond("build", 1, "error CS0246", "");

        let err = run_checked(&runner, "dotnet", &["build".to_string()], None).unwrap_err();
        assert!(matches!(
            err,
            BuildError::ExternalToolFailure { ref stderr, .. } if stderr == "error CS0246"
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_process_runner_captures_output() {
        let output = ProcessRunner
            .run("sh", &["-c".to_string(), "echo hi; exit 2".to_string()], None)
            .unwrap();
        assert_eq!(output.exit_code, 2);
        assert_eq!(output.stdout.trim(), "hi");
        assert!(!output.success());
    }
}
