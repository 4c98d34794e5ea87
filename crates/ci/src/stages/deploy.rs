use super::{SiteDeployer, StepContext, run_checked};
use crate::runner::CommandRunner;
use async_trait::async_trait;
use docpub_core::config::DeployConfig;
use docpub_core::{CommitIdentity, Error, Result};

/// Runs the site generator's deploy command with the commit identity applied
#[derive(Debug, Clone)]
pub struct CommandSiteDeployer {
    runner: CommandRunner,
    command: Vec<String>,
}

impl CommandSiteDeployer {
    /// Deployer running `command` verbatim
    #[must_use]
    pub fn new(runner: CommandRunner, command: Vec<String>) -> Self {
        Self { runner, command }
    }

    /// Deployer for the `[deploy]` section, targeting its hosting branch
    #[must_use]
    pub fn from_config(runner: CommandRunner, config: &DeployConfig) -> Self {
        Self::new(runner, config.command_line())
    }

    /// Command line this deployer runs
    #[must_use]
    pub fn command(&self) -> &[String] {
        &self.command
    }
}

#[async_trait]
impl SiteDeployer for CommandSiteDeployer {
    #[tracing::instrument(name = "deploy_site", skip_all, fields(identity = %identity))]
    async fn deploy(&self, ctx: &StepContext, identity: &CommitIdentity) -> Result<()> {
        let spec = ctx
            .command("deploy", self.command.clone())
            .with_env(identity.env_vars());
        run_checked(&self.runner, &spec, Error::deploy).await?;
        Ok(())
    }
}
