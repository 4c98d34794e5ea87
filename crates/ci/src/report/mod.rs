//! Publish run reporting
//!
//! A [`PipelineReport`] records what each stage did. It can be written as
//! JSON ([`json::write_report`]) or rendered as a markdown job summary
//! ([`markdown::generate_summary`]).

use crate::context::TriggerEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod json;
pub mod markdown;

pub use json::write_report;
pub use markdown::generate_summary;

/// Report format version.
pub const REPORT_VERSION: &str = "1";

/// Final report for a publish run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Report format version.
    pub version: String,
    /// The event that triggered the run.
    pub context: ContextReport,
    /// Cache key computed for this run.
    pub cache_key: Option<String>,
    /// How the cache was restored (`exact`, `fallback`, `miss`).
    pub cache_restore: Option<String>,
    /// When the pipeline started.
    pub started_at: DateTime<Utc>,
    /// When the pipeline completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// Total duration in milliseconds.
    pub duration_ms: Option<u64>,
    /// Overall pipeline status.
    pub status: PipelineStatus,
    /// Stages in execution order.
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    /// Empty report for a run that starts now
    #[must_use]
    pub fn start(event: &TriggerEvent) -> Self {
        Self {
            version: REPORT_VERSION.to_string(),
            context: ContextReport::from(event),
            cache_key: None,
            cache_restore: None,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            status: PipelineStatus::Pending,
            stages: Vec::new(),
        }
    }

    /// Append a stage result
    pub fn record(&mut self, stage: Stage, status: StageStatus, duration_ms: u64, detail: Option<String>) {
        self.stages.push(StageReport {
            stage,
            status,
            duration_ms,
            detail,
        });
    }

    /// Stamp completion time and final status
    pub fn finish(&mut self, status: PipelineStatus) {
        let now = Utc::now();
        self.status = status;
        self.completed_at = Some(now);
        self.duration_ms = u64::try_from((now - self.started_at).num_milliseconds()).ok();
    }

    /// Report for `stage`, if it ran
    #[must_use]
    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// The stage that failed, if any
    #[must_use]
    pub fn failed_stage(&self) -> Option<Stage> {
        self.stages
            .iter()
            .find(|s| s.status == StageStatus::Failed)
            .map(|s| s.stage)
    }
}

/// The triggering event as recorded in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextReport {
    /// CI provider name (github, local).
    pub provider: String,
    /// Event type (push, workflow_dispatch, etc.).
    pub event: String,
    /// Branch the push landed on.
    pub branch: String,
    /// Git commit SHA.
    pub sha: String,
    /// List of changed files.
    pub changed_files: Vec<String>,
}

impl From<&TriggerEvent> for ContextReport {
    fn from(event: &TriggerEvent) -> Self {
        Self {
            provider: event.provider.clone(),
            event: event.event.clone(),
            branch: event.branch.clone(),
            sha: event.sha.clone(),
            changed_files: event.changed_paths.iter().cloned().collect(),
        }
    }
}

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Acquire the working copy.
    Checkout,
    /// Attach the bot identity and credentials.
    Identity,
    /// Make the package manager and runtime available.
    Toolchain,
    /// Restore the weekly cache.
    CacheRestore,
    /// Install project dependencies.
    Dependencies,
    /// Build and force-publish the site.
    Deploy,
    /// Save the cache under this week's key.
    CacheSave,
}

impl Stage {
    /// Every stage, in execution order
    pub const ALL: [Self; 7] = [
        Self::Checkout,
        Self::Identity,
        Self::Toolchain,
        Self::CacheRestore,
        Self::Dependencies,
        Self::Deploy,
        Self::CacheSave,
    ];

    /// Stable name used in logs and reports
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Checkout => "checkout",
            Self::Identity => "identity",
            Self::Toolchain => "toolchain",
            Self::CacheRestore => "cache-restore",
            Self::Dependencies => "dependencies",
            Self::Deploy => "deploy",
            Self::CacheSave => "cache-save",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Individual stage report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    /// Which stage.
    pub stage: Stage,
    /// Stage completion status.
    pub status: StageStatus,
    /// Execution duration in milliseconds.
    pub duration_ms: u64,
    /// Human-readable outcome (tool versions, restored key, error message).
    pub detail: Option<String>,
}

/// Stage completion status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// Stage completed successfully.
    Success,
    /// Stage failed and aborted the run.
    Failed,
    /// Stage failed without affecting the outcome (cache only).
    Warning,
    /// Stage did not run (cache disabled or dry run).
    Skipped,
}

/// Overall pipeline status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    /// Pipeline is still running.
    Pending,
    /// Site published.
    Success,
    /// A fatal stage failed.
    Failed,
}
