//! GitHub Actions Workflow Generator
//!
//! Emits the workflow file that publishes the documentation on GitHub Actions
//! with the same triggers, toolchain, cache key and commands as `docpub run`.
//!
//! # Example
//!
//! ```ignore
//! use docpub_ci::workflow::{docs_workflow, render_workflow};
//!
//! let yaml = render_workflow(&docs_workflow(&config))?;
//! std::fs::write(".github/workflows/docs.yml", yaml)?;
//! ```

pub mod emitter;
pub mod schema;

pub use emitter::{EmitterError, EmitterResult, docs_workflow, render_workflow};
pub use schema::*;
