//! docpub - publish an MkDocs site on every documentation push
//!
//! The binary is a thin shell over this library:
//!
//! - [`cli`] defines the command line, error type and exit codes
//! - [`commands`] implements `run`, `trigger`, `cache-key` and `workflow`
//! - [`logging`] installs the tracing subscriber
//!
//! The pipeline itself lives in `docpub-ci`.

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

pub mod cli;
pub mod commands;
pub mod logging;

pub use cli::{Cli, CliError, Commands, EXIT_CLI, EXIT_OK, EXIT_STAGE_FAILED, exit_code_for};
pub use commands::{CommandOutput, execute};
