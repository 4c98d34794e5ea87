//! Subcommand implementations
//!
//! Each command returns a [`CommandOutput`] instead of printing, so `main`
//! decides between plain text and the JSON envelope.

use crate::cli::{Cli, CliError, Commands, EXIT_OK, EventArgs, OkEnvelope, RunArgs};
use chrono::NaiveDate;
use docpub_cache::{KeyValueCache, LocalCacheStore, cache_key, cache_key_now, validate_key};
use docpub_ci::provider::CIProvider;
use docpub_ci::report::{generate_summary, write_report};
use docpub_ci::workflow::{docs_workflow, render_workflow};
use docpub_ci::{
    CommandRunner, PipelineOutcome, Publisher, Stages, TriggerDecision, TriggerEvent,
    TriggerFilter, detect_provider,
};
use docpub_core::{Credentials, PublisherConfig};
use miette::Diagnostic;
use serde_json::json;
use std::path::{Path, PathBuf};

/// What a command produced
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Process exit code
    pub exit_code: i32,
    /// Human-readable output
    pub text: String,
    /// Machine-readable output, wrapped in an [`OkEnvelope`] for `--json`
    pub data: serde_json::Value,
}

impl CommandOutput {
    fn new(text: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            exit_code: EXIT_OK,
            text: text.into(),
            data,
        }
    }

    /// Render for stdout
    #[must_use]
    pub fn render(&self, json_mode: bool) -> String {
        if json_mode {
            serde_json::to_string(&OkEnvelope::new(&self.data))
                .unwrap_or_else(|_| String::from(r#"{"status":"ok"}"#))
        } else {
            self.text.clone()
        }
    }
}

/// Dispatch the parsed command line
pub async fn execute(cli: &Cli) -> Result<CommandOutput, CliError> {
    let workspace = resolve_workspace(cli.workspace.as_deref())?;
    let config = load_config(&workspace, cli.config.as_deref())?;

    match &cli.command {
        Commands::Run(args) => run(config, &workspace, args).await,
        Commands::Trigger(args) => trigger(&config, &workspace, args).await,
        Commands::CacheKey { date, prefix } => show_cache_key(&config, *date, prefix.as_deref()),
        Commands::Workflow { output } => workflow(&config, output.as_deref()),
    }
}

fn resolve_workspace(path: Option<&Path>) -> Result<PathBuf, CliError> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => std::env::current_dir()
            .map_err(|e| CliError::other(format!("cannot determine the current directory: {e}"))),
    }
}

/// Load `explicit`, or discover `docpub.toml` in `workspace`
pub fn load_config(workspace: &Path, explicit: Option<&Path>) -> Result<PublisherConfig, CliError> {
    let config = match explicit {
        Some(path) if !path.is_file() => {
            return Err(CliError::config(format!(
                "configuration file {} does not exist",
                path.display()
            )));
        }
        Some(path) => PublisherConfig::load(path)?,
        None => PublisherConfig::discover(workspace)?,
    };
    Ok(config)
}

/// Event from explicit flags, or from the provider when `--branch` is absent
async fn resolve_event(args: &EventArgs, provider: &dyn CIProvider) -> Result<TriggerEvent, CliError> {
    if let Some(branch) = &args.branch {
        return Ok(TriggerEvent::push(branch, args.paths.iter().cloned())
            .with_sha(args.sha.clone().unwrap_or_default())
            .with_provider("cli"));
    }
    Ok(provider.trigger_event().await?)
}

fn cache_store(config: &PublisherConfig) -> Result<Box<dyn KeyValueCache>, CliError> {
    let store = match &config.cache.root {
        Some(root) => LocalCacheStore::new(root.clone()),
        None => LocalCacheStore::from_env()?,
    };
    tracing::debug!(root = %store.root().display(), "Using cache store");
    Ok(Box::new(store))
}

async fn run(
    config: PublisherConfig,
    workspace: &Path,
    args: &RunArgs,
) -> Result<CommandOutput, CliError> {
    let provider = detect_provider(workspace);
    let event = resolve_event(&args.event, provider.as_ref()).await?;

    let runner = if args.dry_run {
        CommandRunner::dry_run()
    } else {
        CommandRunner::new()
    };
    let stages = Stages::from_config(&config, &runner, cache_store(&config)?);
    let remote = args.remote.clone().or_else(|| provider.remote_url());

    let mut publisher = Publisher::new(config, workspace, stages)
        .with_credentials(Credentials::from_env())
        .with_remote(remote)
        .with_dry_run(args.dry_run);
    if let Some(date) = args.cache_date {
        publisher = publisher.with_cache_date(date);
    }

    let outcome = publisher.run(&event).await;

    if let Some(report) = outcome.report() {
        if let Some(key) = &report.cache_key
            && let Err(e) = provider.export_env(&publisher.config().cache.env_var, key)
        {
            tracing::warn!(error = %e, "Could not export the cache key to the job environment");
        }
        if let Err(e) = provider.publish_summary(&generate_summary(report)) {
            tracing::warn!(error = %e, "Could not publish the run summary");
        }
        if let Some(path) = &args.report {
            write_report(report, path)?;
            tracing::info!(path = %path.display(), "Wrote run report");
        }
    }

    match outcome {
        PipelineOutcome::Skipped { reason } => Ok(CommandOutput::new(
            format!("Nothing to publish: {reason}"),
            json!({ "outcome": "skipped", "reason": reason.to_string() }),
        )),
        PipelineOutcome::Published { report } => {
            let text = report.cache_key.as_ref().map_or_else(
                || String::from("Published documentation"),
                |key| format!("Published documentation (cache {key})"),
            );
            Ok(CommandOutput::new(
                text,
                json!({ "outcome": "published", "report": report }),
            ))
        }
        PipelineOutcome::Aborted { stage, error, .. } => {
            let err = CliError::stage(stage.as_str(), error.to_string());
            Err(match Diagnostic::help(&error) {
                Some(help) => err.with_help(help.to_string()),
                None => err,
            })
        }
    }
}

async fn trigger(
    config: &PublisherConfig,
    workspace: &Path,
    args: &EventArgs,
) -> Result<CommandOutput, CliError> {
    let provider = detect_provider(workspace);
    let event = resolve_event(args, provider.as_ref()).await?;

    match TriggerFilter::from_config(&config.trigger).evaluate(&event) {
        TriggerDecision::Run { matched_paths } => {
            let mut text = format!("run: {event}");
            for path in &matched_paths {
                text.push_str("\n  ");
                text.push_str(path);
            }
            Ok(CommandOutput::new(
                text,
                json!({ "run": true, "branch": event.branch, "matched_paths": matched_paths }),
            ))
        }
        TriggerDecision::Skip(reason) => Ok(CommandOutput::new(
            format!("skip: {reason}"),
            json!({ "run": false, "branch": event.branch, "reason": reason.to_string() }),
        )),
    }
}

fn show_cache_key(
    config: &PublisherConfig,
    date: Option<NaiveDate>,
    prefix: Option<&str>,
) -> Result<CommandOutput, CliError> {
    let prefix = prefix.unwrap_or(&config.cache.prefix);
    let key = date.map_or_else(|| cache_key_now(prefix), |date| cache_key(prefix, date));
    validate_key(&key).map_err(|e| CliError::config(e.to_string()))?;

    Ok(CommandOutput::new(
        key.clone(),
        json!({ "key": key, "env_var": config.cache.env_var }),
    ))
}

fn workflow(config: &PublisherConfig, output: Option<&Path>) -> Result<CommandOutput, CliError> {
    let yaml = render_workflow(&docs_workflow(config)).map_err(|e| CliError::other(e.to_string()))?;

    let Some(path) = output else {
        return Ok(CommandOutput::new(yaml.trim_end(), json!({ "workflow": yaml })));
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            CliError::other(format!("cannot create {}: {e}", parent.display()))
        })?;
    }
    std::fs::write(path, &yaml)
        .map_err(|e| CliError::other(format!("cannot write {}: {e}", path.display())))?;

    Ok(CommandOutput::new(
        format!("Wrote workflow to {}", path.display()),
        json!({ "path": path.display().to_string() }),
    ))
}
