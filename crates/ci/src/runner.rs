//! Step command runner
//!
//! Executes one external command per call with an explicit working directory
//! and an environment overlay on top of the inherited process environment.

use miette::Diagnostic;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// Error types for command execution
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    /// Command line is empty
    #[error("Step '{step}' has an empty command")]
    #[diagnostic(code(docpub::runner::empty_command))]
    EmptyCommand {
        /// Step identifier
        step: String,
    },

    /// Executable was not found on PATH
    #[error("Step '{step}': command '{program}' not found")]
    #[diagnostic(
        code(docpub::runner::not_found),
        help("Install '{program}' or add it to PATH")
    )]
    NotFound {
        /// Step identifier
        step: String,
        /// Program that could not be found
        program: String,
    },

    /// Process could not be started or waited on
    #[error("Step '{step}' execution failed: {source}")]
    #[diagnostic(code(docpub::runner::execution_failed))]
    ExecutionFailed {
        /// Step identifier
        step: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// A command to run for a pipeline step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Step identifier used in logs
    pub id: String,
    /// Program followed by its arguments
    pub command: Vec<String>,
    /// Working directory
    pub cwd: PathBuf,
    /// Variables layered over the inherited environment
    pub env: BTreeMap<String, String>,
    /// Capture stdout/stderr instead of streaming them
    pub capture: bool,
}

impl CommandSpec {
    /// Command streaming its output, with no extra environment
    #[must_use]
    pub fn new(id: impl Into<String>, command: Vec<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            command,
            cwd: cwd.into(),
            env: BTreeMap::new(),
            capture: false,
        }
    }

    /// Add environment variables
    #[must_use]
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Capture output rather than streaming it
    #[must_use]
    pub fn captured(mut self) -> Self {
        self.capture = true;
        self
    }

    /// Command line joined for display
    #[must_use]
    pub fn display_command(&self) -> String {
        self.command.join(" ")
    }
}

/// Output from a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Step identifier
    pub id: String,
    /// Process exit code (-1 when killed by a signal)
    pub exit_code: i32,
    /// Captured stdout (empty when streaming)
    pub stdout: String,
    /// Captured stderr (empty when streaming)
    pub stderr: String,
    /// Whether the command succeeded
    pub success: bool,
    /// Execution duration in milliseconds
    pub duration_ms: u64,
}

impl CommandOutput {
    /// Create a dry-run result
    #[must_use]
    pub fn dry_run(id: String) -> Self {
        Self {
            id,
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            success: true,
            duration_ms: 0,
        }
    }

    /// Last non-empty line of stderr (or stdout), for error messages
    #[must_use]
    pub fn failure_summary(&self) -> String {
        let tail = self
            .stderr
            .lines()
            .chain(self.stdout.lines())
            .rev()
            .find(|l| !l.trim().is_empty())
            .map(str::trim);
        match tail {
            Some(line) => format!("exit code {}: {line}", self.exit_code),
            None => format!("exit code {}", self.exit_code),
        }
    }
}

/// Runner for step commands
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    dry_run: bool,
}

impl CommandRunner {
    /// Runner that executes commands
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner that only logs what it would execute
    #[must_use]
    pub fn dry_run() -> Self {
        Self { dry_run: true }
    }

    /// Whether commands are skipped
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Execute a command and wait for it.
    ///
    /// A non-zero exit is reported through [`CommandOutput::success`], not as an
    /// error; errors mean the process could not run at all.
    #[tracing::instrument(
        name = "run_command",
        fields(step = %spec.id, cwd = %spec.cwd.display()),
        skip(self, spec)
    )]
    pub async fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        let Some((program, args)) = spec.command.split_first() else {
            return Err(RunnerError::EmptyCommand {
                step: spec.id.clone(),
            });
        };

        if self.dry_run {
            tracing::info!(step = %spec.id, cmd = %spec.display_command(), "Dry run, not executing");
            return Ok(CommandOutput::dry_run(spec.id.clone()));
        }

        let start = std::time::Instant::now();

        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.current_dir(&spec.cwd);
        cmd.envs(&spec.env);
        cmd.stdin(Stdio::null());
        if spec.capture {
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit());
            cmd.stderr(Stdio::inherit());
        }

        tracing::info!(step = %spec.id, cmd = %spec.display_command(), "Running step command");

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound && spec.cwd.is_dir() {
                RunnerError::NotFound {
                    step: spec.id.clone(),
                    program: program.clone(),
                }
            } else {
                RunnerError::ExecutionFailed {
                    step: spec.id.clone(),
                    source: e,
                }
            }
        })?;

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let exit_code = output.status.code().unwrap_or(-1);
        let success = output.status.success();

        tracing::info!(
            step = %spec.id,
            exit_code,
            success,
            duration_ms,
            "Step command completed"
        );

        Ok(CommandOutput {
            id: spec.id.clone(),
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn test_simple_command() {
        let tmp = TempDir::new().unwrap();
        let spec = CommandSpec::new("echo", cmd(&["echo", "hello"]), tmp.path()).captured();

        let result = CommandRunner::new().execute(&spec).await.unwrap();

        assert!(result.success);
        assert_eq!(result.exit_code, 0);
        assert!(result.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_env_overlay() {
        let tmp = TempDir::new().unwrap();
        let spec = CommandSpec::new("env", cmd(&["printenv", "cache_id"]), tmp.path())
            .with_env([("cache_id", "mkdocs-material-27")])
            .captured();

        let result = CommandRunner::new().execute(&spec).await.unwrap();

        assert!(result.success);
        assert_eq!(result.stdout.trim(), "mkdocs-material-27");
    }

    #[tokio::test]
    async fn test_inherits_path() {
        let tmp = TempDir::new().unwrap();
        let spec = CommandSpec::new("path", cmd(&["printenv", "PATH"]), tmp.path()).captured();
        let result = CommandRunner::new().execute(&spec).await.unwrap();
        assert!(result.success);
        assert!(!result.stdout.trim().is_empty());
    }

    #[tokio::test]
    async fn test_runs_in_cwd() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("marker.txt"), "here").unwrap();
        let spec = CommandSpec::new("cat", cmd(&["cat", "marker.txt"]), tmp.path()).captured();
        let result = CommandRunner::new().execute(&spec).await.unwrap();
        assert_eq!(result.stdout, "here");
    }

    #[tokio::test]
    async fn test_failing_command() {
        let tmp = TempDir::new().unwrap();
        let spec = CommandSpec::new("fail", cmd(&["false"]), tmp.path()).captured();

        let result = CommandRunner::new().execute(&spec).await.unwrap();

        assert!(!result.success);
        assert_ne!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_missing_program() {
        let tmp = TempDir::new().unwrap();
        let spec = CommandSpec::new(
            "missing",
            cmd(&["docpub-definitely-not-installed"]),
            tmp.path(),
        );
        let result = CommandRunner::new().execute(&spec).await;
        assert!(matches!(result, Err(RunnerError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_empty_command_error() {
        let tmp = TempDir::new().unwrap();
        let spec = CommandSpec::new("empty", vec![], tmp.path());
        let result = CommandRunner::new().execute(&spec).await;
        assert!(matches!(result, Err(RunnerError::EmptyCommand { .. })));
    }

    #[tokio::test]
    async fn test_dry_run_skips_execution() {
        let tmp = TempDir::new().unwrap();
        let spec = CommandSpec::new(
            "touch",
            cmd(&["touch", "should-not-exist"]),
            tmp.path(),
        );
        let runner = CommandRunner::dry_run();
        let result = runner.execute(&spec).await.unwrap();
        assert!(runner.is_dry_run());
        assert!(result.success);
        assert!(!tmp.path().join("should-not-exist").exists());
    }

    #[test]
    fn test_failure_summary_prefers_stderr_tail() {
        let output = CommandOutput {
            id: "deps".into(),
            exit_code: 1,
            stdout: "Resolving dependencies...\n".into(),
            stderr: "HTTPError\nConnection refused\n\n".into(),
            success: false,
            duration_ms: 5,
        };
        assert_eq!(output.failure_summary(), "exit code 1: Connection refused");
    }
}
