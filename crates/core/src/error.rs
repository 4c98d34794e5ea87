//! Error types shared across the docpub crates

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Main error type for docpub operations.
///
/// Every fatal pipeline stage has its own variant so the CLI and the report can
/// tell which step aborted the run.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(docpub::config),
        help("Check docpub.toml and the command line flags")
    )]
    Configuration {
        /// Description of the problem
        message: String,
    },

    /// I/O failure with optional path context
    #[error("I/O {operation} failed{}: {source}", path.as_ref().map_or(String::new(), |p| format!(" on {}", p.display())))]
    #[diagnostic(
        code(docpub::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g. "read", "create")
        operation: String,
    },

    /// Repository checkout could not be acquired
    #[error("Checkout failed: {message}")]
    #[diagnostic(
        code(docpub::fetch),
        help("Verify the remote URL and that GITHUB_TOKEN grants read access")
    )]
    Fetch {
        /// Description of the failure
        message: String,
    },

    /// A required tool is missing and could not be installed
    #[error("Toolchain provisioning failed for {tool}: {message}")]
    #[diagnostic(code(docpub::toolchain))]
    Toolchain {
        /// Tool that failed to provision
        tool: String,
        /// Description of the failure
        message: String,
    },

    /// Project dependencies could not be resolved or installed
    #[error("Dependency installation failed: {message}")]
    #[diagnostic(
        code(docpub::dependencies),
        help("Check the package registry is reachable and the lock file is current")
    )]
    Dependencies {
        /// Description of the failure
        message: String,
    },

    /// The site could not be built or pushed to the hosting branch
    #[error("Publishing failed: {message}")]
    #[diagnostic(code(docpub::deploy))]
    Deploy {
        /// Description of the failure
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create a checkout error
    #[must_use]
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch {
            message: msg.into(),
        }
    }

    /// Create a toolchain error for the named tool
    #[must_use]
    pub fn toolchain(tool: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Toolchain {
            tool: tool.into(),
            message: msg.into(),
        }
    }

    /// Create a dependency installation error
    #[must_use]
    pub fn dependencies(msg: impl Into<String>) -> Self {
        Self::Dependencies {
            message: msg.into(),
        }
    }

    /// Create a publishing error
    #[must_use]
    pub fn deploy(msg: impl Into<String>) -> Self {
        Self::Deploy {
            message: msg.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            path: None,
            operation: "io".to_string(),
        }
    }
}

/// Result type alias for docpub operations
pub type Result<T> = std::result::Result<T, Error>;
