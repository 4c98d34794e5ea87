use super::{ProvisionedTool, StepContext, ToolchainInfo, ToolchainProvisioner, run_checked};
use crate::runner::CommandRunner;
use async_trait::async_trait;
use docpub_core::config::ToolSpec;
use docpub_core::{Error, Result};

/// Probes each configured tool and runs its install command when absent
#[derive(Debug, Clone)]
pub struct CommandToolchainProvisioner {
    runner: CommandRunner,
    tools: Vec<ToolSpec>,
}

impl CommandToolchainProvisioner {
    /// Provisioner for `tools`, in order
    #[must_use]
    pub fn new(runner: CommandRunner, tools: Vec<ToolSpec>) -> Self {
        Self { runner, tools }
    }

    /// Version line from a probe, `None` if the tool is unavailable
    async fn probe(&self, ctx: &StepContext, tool: &ToolSpec) -> Option<String> {
        let spec = ctx.command(&format!("probe-{}", tool.name), tool.probe.clone()).captured();
        match self.runner.execute(&spec).await {
            Ok(output) if output.success => Some(
                output
                    .stdout
                    .lines()
                    .chain(output.stderr.lines())
                    .map(str::trim)
                    .find(|l| !l.is_empty())
                    .unwrap_or_default()
                    .to_string(),
            ),
            Ok(output) => {
                tracing::debug!(tool = %tool.name, "Probe failed: {}", output.failure_summary());
                None
            }
            Err(e) => {
                tracing::debug!(tool = %tool.name, "Probe failed: {e}");
                None
            }
        }
    }

    async fn provision_tool(&self, ctx: &StepContext, tool: &ToolSpec) -> Result<ProvisionedTool> {
        if let Some(version) = self.probe(ctx, tool).await {
            tracing::info!(tool = %tool.name, %version, "Tool available");
            return Ok(ProvisionedTool {
                name: tool.name.clone(),
                version,
                installed: false,
            });
        }

        let Some(install) = &tool.install else {
            return Err(Error::toolchain(
                &tool.name,
                "not found and no install command is configured",
            ));
        };

        tracing::info!(tool = %tool.name, cmd = %install.join(" "), "Installing missing tool");
        let spec = ctx.command(&format!("install-{}", tool.name), install.clone());
        run_checked(&self.runner, &spec, |msg| Error::toolchain(&tool.name, msg)).await?;

        let version = self.probe(ctx, tool).await.ok_or_else(|| {
            Error::toolchain(&tool.name, "still unavailable after running the install command")
        })?;
        tracing::info!(tool = %tool.name, %version, "Tool installed");

        Ok(ProvisionedTool {
            name: tool.name.clone(),
            version,
            installed: true,
        })
    }
}

#[async_trait]
impl ToolchainProvisioner for CommandToolchainProvisioner {
    #[tracing::instrument(name = "provision_toolchain", skip_all, fields(tools = self.tools.len()))]
    async fn provision(&self, ctx: &StepContext) -> Result<ToolchainInfo> {
        let mut info = ToolchainInfo::default();
        for tool in &self.tools {
            info.tools.push(self.provision_tool(ctx, tool).await?);
        }
        Ok(info)
    }
}
