use crate::logging::{LogFormat, LogLevel, LoggingConfig};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use miette::{Diagnostic, Report};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Published, or nothing to publish
pub const EXIT_OK: i32 = 0;
/// A pipeline stage failed
pub const EXIT_STAGE_FAILED: i32 = docpub_ci::EXIT_STAGE_FAILED;
/// CLI or configuration error exit code
pub const EXIT_CLI: i32 = 2;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// CLI or configuration error (exit code 2)
    #[error("CLI/configuration error: {message}")]
    #[diagnostic(code(docpub::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// A pipeline stage failed (exit code 1)
    #[error("Pipeline aborted at {stage}: {message}")]
    #[diagnostic(code(docpub::cli::stage))]
    Stage {
        /// Name of the failed stage
        stage: String,
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Other unexpected error (exit code 1)
    #[error("Unexpected error: {message}")]
    #[diagnostic(code(docpub::cli::other))]
    Other {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new stage failure
    #[must_use]
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.into(),
            help: None,
        }
    }

    /// Create a new other error
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            help: None,
        }
    }

    /// Add help text to an existing error, returning a new error with the help text set.
    #[must_use]
    pub fn with_help(self, help_text: impl Into<String>) -> Self {
        let help = Some(help_text.into());
        match self {
            Self::Config { message, .. } => Self::Config { message, help },
            Self::Stage { stage, message, .. } => Self::Stage {
                stage,
                message,
                help,
            },
            Self::Other { message, .. } => Self::Other { message, help },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Stage { .. } => "stage",
            Self::Other { .. } => "other",
        }
    }
}

/// Convert `docpub_core::Error` to the matching `CliError` variant.
///
/// Configuration problems exit with 2, everything else is a failed run.
impl From<docpub_core::Error> for CliError {
    fn from(err: docpub_core::Error) -> Self {
        let help = Diagnostic::help(&err).map(|h| h.to_string());
        let converted = match &err {
            docpub_core::Error::Configuration { message } => Self::config(message.clone()),
            _ => Self::other(err.to_string()),
        };
        match help {
            Some(help) => converted.with_help(help),
            None => converted,
        }
    }
}

impl From<docpub_cache::Error> for CliError {
    fn from(err: docpub_cache::Error) -> Self {
        Self::other(err.to_string())
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Stage { .. } | CliError::Other { .. } => EXIT_STAGE_FAILED,
    }
}

/// Success response envelope for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct OkEnvelope<T> {
    /// Always "ok"
    pub status: &'static str,
    /// The command payload
    pub data: T,
}

impl<T> OkEnvelope<T> {
    /// Create a new success envelope
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

/// Error response envelope for JSON output
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope<E> {
    /// Always "error"
    pub status: &'static str,
    /// The error details
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    /// Create a new error envelope
    #[must_use]
    pub const fn new(error: E) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// JSON error envelope for `err`
#[must_use]
pub fn error_json(err: &CliError) -> String {
    let envelope = ErrorEnvelope::new(serde_json::json!({
        "code": err.code(),
        "message": err.to_string(),
    }));
    serde_json::to_string(&envelope)
        .unwrap_or_else(|_| String::from(r#"{"status":"error"}"#))
}

/// Render error appropriately based on JSON flag
pub fn render_error(err: &CliError, json_mode: bool) {
    if json_mode {
        println!("{}", error_json(err));
    } else {
        let report = Report::new(err.clone());
        eprintln!("{report:?}");
        let _ = io::stderr().flush();
    }
}

/// Publish an MkDocs site to its hosting branch whenever the documentation
/// changes on the publishing branch.
#[derive(Parser, Debug)]
#[command(name = "docpub")]
#[command(about = "Publish MkDocs documentation on qualifying pushes")]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long = "log-level",
        global = true,
        default_value = "info",
        value_enum
    )]
    pub level: LogLevel,

    /// Log line format on stderr.
    #[arg(long = "log-format", global = true, default_value = "compact", value_enum)]
    pub log_format: LogFormat,

    /// Emit JSON logs and a JSON envelope on stdout.
    #[arg(long, global = true)]
    pub json: bool,

    /// Repository checkout to operate on (defaults to the current directory).
    #[arg(short = 'C', long, global = true, env = "DOCPUB_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Configuration file (defaults to `docpub.toml` in the workspace).
    #[arg(short = 'c', long, global = true, env = "DOCPUB_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Logging setup for this invocation; `--json` forces JSON log lines.
    #[must_use]
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            format: if self.json {
                LogFormat::Json
            } else {
                self.log_format
            },
            level: self.level,
        }
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the publishing pipeline for the current push.
    Run(RunArgs),

    /// Report whether the current push qualifies, without running anything.
    Trigger(EventArgs),

    /// Print the cache key for today (or `--date`).
    CacheKey {
        /// Compute the key for this day instead of today (YYYY-MM-DD).
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Override the configured key prefix.
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Print the equivalent GitHub Actions workflow.
    Workflow {
        /// Write the workflow to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Describes the push being handled; detected from the CI environment (or
/// the local checkout) when `--branch` is absent.
#[derive(Args, Debug, Clone, Default)]
pub struct EventArgs {
    /// Branch the push landed on.
    #[arg(long)]
    pub branch: Option<String>,

    /// A path changed by the push (repeatable).
    #[arg(long = "path", requires = "branch")]
    pub paths: Vec<String>,

    /// Commit the push points at.
    #[arg(long, requires = "branch")]
    pub sha: Option<String>,
}

/// Options for `docpub run`.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// The push being handled
    #[command(flatten)]
    pub event: EventArgs,

    /// Clone URL used when the workspace is not a checkout yet.
    #[arg(long, env = "DOCPUB_REMOTE")]
    pub remote: Option<String>,

    /// Write the JSON run report to this file.
    #[arg(long, env = "DOCPUB_REPORT")]
    pub report: Option<PathBuf>,

    /// Log the commands instead of running them; the cache is left untouched.
    #[arg(long)]
    pub dry_run: bool,

    /// Compute the cache key for this day instead of today (YYYY-MM-DD).
    #[arg(long)]
    pub cache_date: Option<NaiveDate>,
}
