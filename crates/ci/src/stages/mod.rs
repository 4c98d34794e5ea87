//! Pipeline stage contracts
//!
//! Each external action the publisher depends on sits behind a trait so the
//! orchestrator can be driven by process-backed implementations in production
//! and by recording mocks in tests:
//!
//! - [`SourceFetcher`] acquires the working copy at the triggering commit
//! - [`ToolchainProvisioner`] makes the package manager and runtime available
//! - [`DependencyInstaller`] materializes the project's dependencies
//! - [`SiteDeployer`] builds the site and force-publishes it
//!
//! The cache contract lives in `docpub_cache::KeyValueCache`.

mod checkout;
mod dependencies;
mod deploy;
mod toolchain;

pub use checkout::GitSourceFetcher;
pub use dependencies::CommandDependencyInstaller;
pub use deploy::CommandSiteDeployer;
pub use toolchain::CommandToolchainProvisioner;

use crate::runner::{CommandOutput, CommandRunner, CommandSpec};
use async_trait::async_trait;
use docpub_core::{CommitIdentity, Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Where and with what environment a stage runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepContext {
    /// Root of the checked-out repository
    pub workspace: PathBuf,
    /// Directory commands run in (`<workspace>/docs` by default)
    pub working_dir: PathBuf,
    /// Variables layered over the inherited environment
    pub env: BTreeMap<String, String>,
}

impl StepContext {
    /// Context rooted at `working_dir` inside `workspace`
    #[must_use]
    pub fn new(workspace: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            working_dir: working_dir.into(),
            env: BTreeMap::new(),
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
        self.set_env(vars);
        self
    }

    /// Add environment variables in place
    pub fn set_env<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
    }

    /// Command for this context: runs in the working directory with the overlay
    #[must_use]
    pub fn command(&self, id: &str, command: Vec<String>) -> CommandSpec {
        CommandSpec::new(id, command, &self.working_dir).with_env(self.env.clone())
    }
}

/// What to check out and where
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    /// Directory that holds (or will hold) the working copy
    pub workspace: PathBuf,
    /// Clone URL, needed only when the workspace is not a checkout yet
    pub remote: Option<String>,
    /// Branch the push landed on
    pub branch: String,
    /// Commit to check out; empty means the branch head
    pub sha: String,
    /// Variables for git (authentication)
    pub env: BTreeMap<String, String>,
}

/// Result of a checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutInfo {
    /// Root of the working copy
    pub workspace: PathBuf,
    /// Commit HEAD points at
    pub sha: String,
    /// Whether the repository was cloned by this run
    pub cloned: bool,
    /// Whether missing history was fetched
    pub unshallowed: bool,
}

/// A tool confirmed available by the toolchain stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionedTool {
    /// Tool name
    pub name: String,
    /// First line of the probe output
    pub version: String,
    /// Whether this run had to install it
    pub installed: bool,
}

/// Result of toolchain provisioning
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolchainInfo {
    /// Tools in provisioning order
    pub tools: Vec<ProvisionedTool>,
}

impl ToolchainInfo {
    /// Version reported for `name`
    #[must_use]
    pub fn version_of(&self, name: &str) -> Option<&str> {
        self.tools
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.version.as_str())
    }
}

/// Acquires a full working copy at the triggering commit
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Check out `request.sha` (or the branch head) into `request.workspace`
    async fn fetch(&self, request: &FetchRequest) -> Result<CheckoutInfo>;
}

/// Ensures the package manager and a matching runtime are available
#[async_trait]
pub trait ToolchainProvisioner: Send + Sync {
    /// Probe each tool, installing the ones that are missing
    async fn provision(&self, ctx: &StepContext) -> Result<ToolchainInfo>;
}

/// Resolves and installs the project's declared dependencies
#[async_trait]
pub trait DependencyInstaller: Send + Sync {
    /// Install into the project's isolated environment
    async fn install(&self, ctx: &StepContext) -> Result<()>;
}

/// Builds the site and force-publishes it to the hosting branch.
///
/// Any commit the deploy produces is attributed to `identity`.
#[async_trait]
pub trait SiteDeployer: Send + Sync {
    /// Build and publish; the hosting branch is fully overwritten
    async fn deploy(&self, ctx: &StepContext, identity: &CommitIdentity) -> Result<()>;
}

/// Run `spec`, turning spawn errors and non-zero exits into `fail(message)`
pub(crate) async fn run_checked(
    runner: &CommandRunner,
    spec: &CommandSpec,
    fail: impl Fn(String) -> Error,
) -> Result<CommandOutput> {
    let output = runner
        .execute(spec)
        .await
        .map_err(|e| fail(e.to_string()))?;
    if output.success {
        Ok(output)
    } else {
        Err(fail(format!(
            "`{}` failed with {}",
            spec.display_command(),
            output.failure_summary()
        )))
    }
}

pub(crate) fn to_args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| (*s).to_string()).collect()
}

pub(crate) fn is_git_checkout(dir: &Path) -> bool {
    dir.join(".git").exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_context_command_carries_overlay() {
        let ctx = StepContext::new("/repo", "/repo/docs")
            .with_env([("cache_id", "mkdocs-material-27")]);
        let spec = ctx.command("deps", to_args(&["poetry", "install"]));
        assert_eq!(spec.cwd, PathBuf::from("/repo/docs"));
        assert_eq!(
            spec.env.get("cache_id").map(String::as_str),
            Some("mkdocs-material-27")
        );
        assert_eq!(spec.display_command(), "poetry install");
    }

    #[test]
    fn test_toolchain_info_version_lookup() {
        let info = ToolchainInfo {
            tools: vec![ProvisionedTool {
                name: "poetry".into(),
                version: "Poetry (version 1.8.3)".into(),
                installed: false,
            }],
        };
        assert_eq!(info.version_of("poetry"), Some("Poetry (version 1.8.3)"));
        assert_eq!(info.version_of("python"), None);
    }

    #[tokio::test]
    async fn test_run_checked_maps_failure() {
        let tmp = tempfile::TempDir::new().unwrap();
        let spec = CommandSpec::new("fail", to_args(&["false"]), tmp.path());
        let err = run_checked(&CommandRunner::new(), &spec, Error::dependencies)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Dependencies { .. }));
        assert!(err.to_string().contains("`false` failed with exit code"));
    }
}
