use super::{DependencyInstaller, StepContext, run_checked};
use crate::runner::CommandRunner;
use async_trait::async_trait;
use docpub_core::{Error, Result};

/// Runs the configured install command (`poetry install` by default)
#[derive(Debug, Clone)]
pub struct CommandDependencyInstaller {
    runner: CommandRunner,
    command: Vec<String>,
}

impl CommandDependencyInstaller {
    /// Installer running `command`
    #[must_use]
    pub fn new(runner: CommandRunner, command: Vec<String>) -> Self {
        Self { runner, command }
    }
}

#[async_trait]
impl DependencyInstaller for CommandDependencyInstaller {
    #[tracing::instrument(name = "install_dependencies", skip_all)]
    async fn install(&self, ctx: &StepContext) -> Result<()> {
        let spec = ctx.command("dependencies", self.command.clone());
        run_checked(&self.runner, &spec, Error::dependencies).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::to_args;
    use tempfile::TempDir;

    #[tokio::test]
    async fn install_sees_cache_id() {
        let tmp = TempDir::new().unwrap();
        let ctx = StepContext::new(tmp.path(), tmp.path())
            .with_env([("cache_id", "mkdocs-material-05")]);
        let installer = CommandDependencyInstaller::new(
            CommandRunner::new(),
            to_args(&["sh", "-c", "test \"$cache_id\" = mkdocs-material-05"]),
        );
        installer.install(&ctx).await.unwrap();
    }

    #[tokio::test]
    async fn failed_install_is_dependencies_error() {
        let tmp = TempDir::new().unwrap();
        let ctx = StepContext::new(tmp.path(), tmp.path());
        let installer = CommandDependencyInstaller::new(CommandRunner::new(), to_args(&["false"]));
        let err = installer.install(&ctx).await.unwrap_err();
        assert!(matches!(err, Error::Dependencies { .. }));
    }
}
