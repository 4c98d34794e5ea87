//! The publishing pipeline
//!
//! [`Publisher::run`] filters the trigger event, then walks the stages in a
//! fixed order and stops at the first fatal failure. Cache restore and save
//! are advisory: their errors are logged and recorded but never abort a run.

use crate::context::TriggerEvent;
use crate::report::{PipelineReport, PipelineStatus, Stage, StageStatus};
use crate::runner::CommandRunner;
use crate::stages::{
    CommandDependencyInstaller, CommandSiteDeployer, CommandToolchainProvisioner, DependencyInstaller,
    FetchRequest, GitSourceFetcher, SiteDeployer, SourceFetcher, StepContext, ToolchainProvisioner,
};
use crate::trigger::{SkipReason, TriggerDecision, TriggerFilter};
use chrono::NaiveDate;
use docpub_cache::{CacheRestore, CacheSave, KeyValueCache, cache_key, cache_key_now};
use docpub_core::{Credentials, Error, PublisherConfig};
use std::path::PathBuf;
use std::time::Instant;

/// Exit code for a published or filtered-out run
pub const EXIT_OK: i32 = 0;
/// Exit code for a run aborted by a fatal stage
pub const EXIT_STAGE_FAILED: i32 = 1;

/// The external collaborators a [`Publisher`] drives
pub struct Stages {
    /// Working copy acquisition
    pub fetcher: Box<dyn SourceFetcher>,
    /// Package manager and runtime
    pub toolchain: Box<dyn ToolchainProvisioner>,
    /// Weekly build cache
    pub cache: Box<dyn KeyValueCache>,
    /// Dependency installation
    pub installer: Box<dyn DependencyInstaller>,
    /// Site build and publish
    pub deployer: Box<dyn SiteDeployer>,
}

impl Stages {
    /// Process-backed stages configured from `config`
    #[must_use]
    pub fn from_config(
        config: &PublisherConfig,
        runner: &CommandRunner,
        cache: Box<dyn KeyValueCache>,
    ) -> Self {
        Self {
            fetcher: Box::new(GitSourceFetcher::new(runner.clone())),
            toolchain: Box::new(CommandToolchainProvisioner::new(
                runner.clone(),
                config.toolchain.tools.clone(),
            )),
            cache,
            installer: Box::new(CommandDependencyInstaller::new(
                runner.clone(),
                config.dependencies.command.clone(),
            )),
            deployer: Box::new(CommandSiteDeployer::from_config(
                runner.clone(),
                &config.deploy,
            )),
        }
    }
}

/// How a run ended
#[derive(Debug)]
pub enum PipelineOutcome {
    /// The event did not qualify; nothing ran
    Skipped {
        /// Why the event was filtered out
        reason: SkipReason,
    },
    /// Every fatal stage succeeded
    Published {
        /// Stage-by-stage report
        report: PipelineReport,
    },
    /// A fatal stage failed and the remaining stages were not run
    Aborted {
        /// The stage that failed
        stage: Stage,
        /// Its error
        error: Error,
        /// Report up to and including the failure
        report: PipelineReport,
    },
}

impl PipelineOutcome {
    /// Process exit code for this outcome
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Skipped { .. } | Self::Published { .. } => EXIT_OK,
            Self::Aborted { .. } => EXIT_STAGE_FAILED,
        }
    }

    /// The run report, absent for skipped events
    #[must_use]
    pub fn report(&self) -> Option<&PipelineReport> {
        match self {
            Self::Skipped { .. } => None,
            Self::Published { report } | Self::Aborted { report, .. } => Some(report),
        }
    }

    /// Whether the site was published
    #[must_use]
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }
}

/// Orchestrates one publish run
pub struct Publisher {
    config: PublisherConfig,
    workspace: PathBuf,
    stages: Stages,
    credentials: Credentials,
    remote: Option<String>,
    cache_date: Option<NaiveDate>,
    dry_run: bool,
}

/// Fails the run at `$stage`, recording the error in the report
macro_rules! abort {
    ($report:ident, $stage:expr, $started:expr, $error:expr) => {{
        let error: Error = $error;
        tracing::error!(stage = %$stage, "{error}");
        $report.record(
            $stage,
            StageStatus::Failed,
            elapsed_ms($started),
            Some(error.to_string()),
        );
        $report.finish(PipelineStatus::Failed);
        return PipelineOutcome::Aborted {
            stage: $stage,
            error,
            report: $report,
        };
    }};
}

impl Publisher {
    /// Publisher for the checkout at `workspace`
    #[must_use]
    pub fn new(config: PublisherConfig, workspace: impl Into<PathBuf>, stages: Stages) -> Self {
        let remote = config.repository.remote.clone();
        Self {
            config,
            workspace: workspace.into(),
            stages,
            credentials: Credentials::default(),
            remote,
            cache_date: None,
            dry_run: false,
        }
    }

    /// Use `credentials` for fetches and pushes
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Clone URL used when the workspace is not a checkout yet
    #[must_use]
    pub fn with_remote(mut self, remote: Option<String>) -> Self {
        if remote.is_some() {
            self.remote = remote;
        }
        self
    }

    /// Compute the cache key for `date` instead of today
    #[must_use]
    pub fn with_cache_date(mut self, date: NaiveDate) -> Self {
        self.cache_date = Some(date);
        self
    }

    /// Leave the cache store untouched (process stages decide for themselves)
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The configuration in effect
    #[must_use]
    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Cache key for this run
    #[must_use]
    pub fn cache_key(&self) -> String {
        let prefix = &self.config.cache.prefix;
        self.cache_date
            .map_or_else(|| cache_key_now(prefix), |date| cache_key(prefix, date))
    }

    /// Whether `event` qualifies for a run
    #[must_use]
    pub fn evaluate(&self, event: &TriggerEvent) -> TriggerDecision {
        TriggerFilter::from_config(&self.config.trigger).evaluate(event)
    }

    /// Run the pipeline for `event`
    #[tracing::instrument(name = "publish", skip_all, fields(event = %event))]
    pub async fn run(&self, event: &TriggerEvent) -> PipelineOutcome {
        let matched = match self.evaluate(event) {
            TriggerDecision::Skip(reason) => {
                tracing::info!(%reason, "Event does not qualify, nothing to publish");
                return PipelineOutcome::Skipped { reason };
            }
            TriggerDecision::Run { matched_paths } => matched_paths,
        };
        tracing::info!(matched = matched.len(), "Publishing documentation");

        let mut report = PipelineReport::start(event);
        let auth_env = self.credentials.git_auth_env(&self.config.repository.host);

        // Checkout
        let started = Instant::now();
        let request = FetchRequest {
            workspace: self.workspace.clone(),
            remote: self.remote.clone(),
            branch: event.branch.clone(),
            sha: event.sha.clone(),
            env: auth_env.iter().cloned().collect(),
        };
        let checkout = match self.stages.fetcher.fetch(&request).await {
            Ok(info) => info,
            Err(e) => abort!(report, Stage::Checkout, started, e),
        };
        report.record(
            Stage::Checkout,
            StageStatus::Success,
            elapsed_ms(started),
            Some(format!("at {}", checkout.sha)),
        );

        // Identity
        let started = Instant::now();
        let identity = &self.config.identity;
        let working_dir = self.config.step_dir(&checkout.workspace);
        if !self.dry_run && !working_dir.is_dir() {
            abort!(
                report,
                Stage::Identity,
                started,
                Error::configuration(format!(
                    "working directory {} does not exist in the checkout",
                    working_dir.display()
                ))
            );
        }
        let mut ctx = StepContext::new(&checkout.workspace, working_dir)
            .with_env(identity.env_vars())
            .with_env(auth_env);
        tracing::info!(%identity, authenticated = self.credentials.has_token(), "Configured commit identity");
        report.record(
            Stage::Identity,
            StageStatus::Success,
            elapsed_ms(started),
            Some(identity.to_string()),
        );

        // Toolchain
        let started = Instant::now();
        let toolchain = match self.stages.toolchain.provision(&ctx).await {
            Ok(info) => info,
            Err(e) => abort!(report, Stage::Toolchain, started, e),
        };
        let versions = toolchain
            .tools
            .iter()
            .map(|t| format!("{}: {}", t.name, t.version))
            .collect::<Vec<_>>()
            .join(", ");
        report.record(
            Stage::Toolchain,
            StageStatus::Success,
            elapsed_ms(started),
            (!versions.is_empty()).then_some(versions),
        );

        // Cache key + restore
        let key = self.cache_key();
        let cache_dir = ctx.working_dir.join(&self.config.cache.path);
        if self.config.cache.enabled {
            ctx.set_env([(self.config.cache.env_var.clone(), key.clone())]);
            tracing::info!(env = %self.config.cache.env_var, %key, "Computed cache key");
            report.cache_key = Some(key.clone());
        }

        let started = Instant::now();
        if self.cache_enabled() {
            match self
                .stages
                .cache
                .restore(&key, &self.config.cache.restore_prefixes, &cache_dir)
            {
                Ok(restore) => {
                    let detail = match &restore {
                        CacheRestore::Exact { key } => format!("restored {key}"),
                        CacheRestore::Fallback { key, prefix } => {
                            format!("restored {key} (prefix {prefix})")
                        }
                        CacheRestore::Miss => "cold cache".to_string(),
                    };
                    tracing::info!(outcome = restore.label(), "{detail}");
                    report.cache_restore = Some(restore.label().to_string());
                    report.record(
                        Stage::CacheRestore,
                        StageStatus::Success,
                        elapsed_ms(started),
                        Some(detail),
                    );
                }
                Err(e) => {
                    tracing::warn!("Cache restore failed, continuing with a cold cache: {e}");
                    report.cache_restore = Some(CacheRestore::Miss.label().to_string());
                    report.record(
                        Stage::CacheRestore,
                        StageStatus::Warning,
                        elapsed_ms(started),
                        Some(e.to_string()),
                    );
                }
            }
        } else {
            report.record(Stage::CacheRestore, StageStatus::Skipped, 0, None);
        }

        // Dependencies
        let started = Instant::now();
        if let Err(e) = self.stages.installer.install(&ctx).await {
            abort!(report, Stage::Dependencies, started, e);
        }
        report.record(
            Stage::Dependencies,
            StageStatus::Success,
            elapsed_ms(started),
            None,
        );

        // Deploy
        let started = Instant::now();
        if let Err(e) = self.stages.deployer.deploy(&ctx, identity).await {
            abort!(report, Stage::Deploy, started, e);
        }
        report.record(
            Stage::Deploy,
            StageStatus::Success,
            elapsed_ms(started),
            Some(format!("published to {}", self.config.deploy.remote_branch)),
        );

        // Cache save, hit or miss
        let started = Instant::now();
        if self.cache_enabled() {
            match self.stages.cache.save(&key, &cache_dir) {
                Ok(CacheSave::Saved(meta)) => {
                    tracing::info!(key = %meta.key, files = meta.files, bytes = meta.size_bytes, "Saved cache");
                    report.record(
                        Stage::CacheSave,
                        StageStatus::Success,
                        elapsed_ms(started),
                        Some(format!("saved {} ({} files)", meta.key, meta.files)),
                    );
                }
                Ok(CacheSave::NothingToSave) => {
                    tracing::info!(dir = %cache_dir.display(), "No cache directory to save");
                    report.record(
                        Stage::CacheSave,
                        StageStatus::Success,
                        elapsed_ms(started),
                        Some("nothing to save".to_string()),
                    );
                }
                Err(e) => {
                    tracing::warn!("Cache save failed: {e}");
                    report.record(
                        Stage::CacheSave,
                        StageStatus::Warning,
                        elapsed_ms(started),
                        Some(e.to_string()),
                    );
                }
            }
        } else {
            report.record(Stage::CacheSave, StageStatus::Skipped, 0, None);
        }

        report.finish(PipelineStatus::Success);
        tracing::info!(duration_ms = report.duration_ms, "Documentation published");
        PipelineOutcome::Published { report }
    }

    fn cache_enabled(&self) -> bool {
        self.config.cache.enabled && !self.dry_run
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
