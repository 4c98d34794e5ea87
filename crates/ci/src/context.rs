use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Normalized view of the CI environment a run executes in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CIContext {
    /// The CI provider name (e.g., "github", "local").
    pub provider: String,
    /// The event that triggered the run (e.g., "push", "workflow_dispatch").
    pub event: String,
    /// Short branch name the run is for.
    pub ref_name: String,
    /// The git commit SHA.
    pub sha: String,
}

/// A push event that may trigger a publish.
///
/// Carries the branch the push landed on and the paths it changed, plus the
/// provider metadata needed for checkout and reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// The CI provider name (e.g., "github", "local").
    pub provider: String,
    /// The event that triggered the run (e.g., "push").
    pub event: String,
    /// Short branch name (e.g., "main").
    pub branch: String,
    /// The git commit SHA; empty means the branch head.
    pub sha: String,
    /// Paths changed by the push, relative to the repository root.
    pub changed_paths: BTreeSet<String>,
}

impl Default for TriggerEvent {
    fn default() -> Self {
        Self {
            provider: String::from("local"),
            event: String::from("push"),
            branch: String::new(),
            sha: String::new(),
            changed_paths: BTreeSet::new(),
        }
    }
}

impl TriggerEvent {
    /// Push event on `branch` touching `paths`
    #[must_use]
    pub fn push<I, S>(branch: &str, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            branch: normalize_branch(branch),
            changed_paths: paths.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Set the commit SHA
    #[must_use]
    pub fn with_sha(mut self, sha: impl Into<String>) -> Self {
        self.sha = sha.into();
        self
    }

    /// Set the provider name
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Event built from a provider context and its changed paths
    #[must_use]
    pub fn from_context<I, S>(context: &CIContext, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            provider: context.provider.clone(),
            event: context.event.clone(),
            branch: normalize_branch(&context.ref_name),
            sha: context.sha.clone(),
            changed_paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

/// Strip `refs/heads/` from a full ref so filters compare short names
#[must_use]
pub fn normalize_branch(reference: &str) -> String {
    reference
        .trim()
        .strip_prefix("refs/heads/")
        .unwrap_or(reference.trim())
        .to_string()
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} on {} ({}, {} changed)",
            self.provider,
            self.event,
            self.branch,
            self.sha.get(..7).unwrap_or(&self.sha),
            self.changed_paths.len()
        )
    }
}
