//! Publishing pipeline for docpub
//!
//! - [`trigger`] decides whether a push qualifies
//! - [`provider`] turns the CI environment (or a local repository) into a
//!   [`TriggerEvent`]
//! - [`stages`] holds the stage contracts and their process-backed
//!   implementations, run through [`runner`]
//! - [`pipeline`] drives the stages in order
//! - [`report`] and [`workflow`] render the outcome and the equivalent
//!   GitHub Actions workflow

pub mod context;
pub mod pipeline;
pub mod provider;
pub mod report;
pub mod runner;
pub mod stages;
pub mod trigger;
pub mod workflow;

pub use context::{CIContext, TriggerEvent};
pub use pipeline::{EXIT_OK, EXIT_STAGE_FAILED, PipelineOutcome, Publisher, Stages};
pub use provider::{CIProvider, GitHubProvider, LocalProvider, detect_provider};
pub use report::{PipelineReport, Stage};
pub use runner::CommandRunner;
pub use trigger::{SkipReason, TriggerDecision, TriggerFilter};
