use crate::context::{CIContext, TriggerEvent};
use async_trait::async_trait;
use docpub_core::Result;
use std::path::Path;
use std::process::Command;

#[async_trait]
pub trait CIProvider: Send + Sync {
    /// Detect if running in this CI environment
    fn detect() -> Option<Self>
    where
        Self: Sized;

    /// Get normalized CI context
    fn context(&self) -> &CIContext;

    /// Get files changed by the triggering push, relative to the repository root
    async fn changed_files(&self) -> Result<Vec<String>>;

    /// Clone URL of the repository being built, if the provider knows it
    fn remote_url(&self) -> Option<String> {
        None
    }

    /// Build the trigger event for this run
    async fn trigger_event(&self) -> Result<TriggerEvent> {
        let paths = self.changed_files().await?;
        Ok(TriggerEvent::from_context(self.context(), paths))
    }

    /// Make a variable visible to later steps of the hosting job
    fn export_env(&self, _name: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    /// Publish the rendered run summary (markdown)
    fn publish_summary(&self, _markdown: &str) -> Result<()> {
        Ok(())
    }
}

pub mod github;
pub mod local;

pub use github::GitHubProvider;
pub use local::LocalProvider;

/// Pick the provider for the current environment, falling back to the local
/// checkout. Either one runs git in `workspace`.
#[must_use]
pub fn detect_provider(workspace: &Path) -> Box<dyn CIProvider> {
    if let Some(github) = GitHubProvider::detect() {
        tracing::debug!("Detected GitHub Actions environment");
        return Box::new(github.with_root(workspace));
    }
    tracing::debug!(workspace = %workspace.display(), "No CI environment detected, using local git");
    Box::new(LocalProvider::for_repo(workspace))
}

/// Run `git diff --name-only <range>` in `dir` and return the listed paths
pub(crate) fn git_diff_names(dir: Option<&Path>, range: &str) -> Option<Vec<String>> {
    tracing::debug!("Trying git diff: {range}");
    let output = git(dir).args(["diff", "--name-only", range]).output().ok()?;

    if !output.status.success() {
        tracing::debug!(
            "git diff failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        return None;
    }

    Some(non_empty_lines(&output.stdout))
}

/// Single-line output of a git query, `None` when git fails
pub(crate) fn git_query(dir: Option<&Path>, args: &[&str]) -> Option<String> {
    let output = git(dir).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!value.is_empty()).then_some(value)
}

pub(crate) fn git(dir: Option<&Path>) -> Command {
    let mut cmd = Command::new("git");
    if let Some(dir) = dir {
        cmd.arg("-C").arg(dir);
    }
    cmd
}

fn non_empty_lines(stdout: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_lines() {
        let lines = non_empty_lines(b"docs/index.md\n\n  docs/guide.md  \n");
        assert_eq!(lines, vec!["docs/index.md", "docs/guide.md"]);
    }

    #[test]
    fn test_detect_provider_falls_back_to_local() {
        let tmp = tempfile::TempDir::new().unwrap();
        temp_env::with_var_unset("GITHUB_ACTIONS", || {
            let provider = detect_provider(tmp.path());
            assert_eq!(provider.context().provider, "local");
        });
    }
}
