use super::schema::{
    Concurrency, Job, PermissionLevel, Permissions, PushTrigger, Step, Workflow, WorkflowTriggers,
};
use docpub_core::PublisherConfig;
use indexmap::IndexMap;
use thiserror::Error;

/// Error types for workflow emission
#[derive(Debug, Error)]
pub enum EmitterError {
    /// YAML serialization failed
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Result type for emitter operations
pub type EmitterResult<T> = std::result::Result<T, EmitterError>;

/// Runner label for the publish job
pub const DEFAULT_RUNNER: &str = "ubuntu-latest";
/// Python version requested from `actions/setup-python`
pub const DEFAULT_PYTHON_VERSION: &str = "3.x";

/// Build the GitHub Actions workflow that performs the same publish as
/// [`Publisher::run`](crate::pipeline::Publisher::run) with `config`.
#[must_use]
pub fn docs_workflow(config: &PublisherConfig) -> Workflow {
    let working_dir = config.repository.working_directory.display().to_string();
    let mut steps = vec![
        Step::uses("actions/checkout@v4")
            .with_name("Checkout")
            .with_input("fetch-depth", serde_yaml::Value::Number(0.into())),
        Step::run(format!(
            "git config user.name \"{}\"\ngit config user.email \"{}\"",
            config.identity.name, config.identity.email
        ))
        .with_name("Configure Git credentials"),
    ];

    for tool in &config.toolchain.tools {
        if tool.name == "python" {
            steps.push(
                Step::uses("actions/setup-python@v5")
                    .with_name("Set up Python")
                    .with_input(
                        "python-version",
                        serde_yaml::Value::String(DEFAULT_PYTHON_VERSION.to_string()),
                    ),
            );
        } else if let Some(install) = &tool.install {
            steps.push(Step::run(install.join(" ")).with_name(format!("Install {}", tool.name)));
        }
    }

    if config.cache.enabled {
        let var = &config.cache.env_var;
        steps.push(
            Step::run(format!(
                "echo \"{var}={}$(date --utc '+%V')\" >> \"$GITHUB_ENV\"",
                config.cache.prefix
            ))
            .with_name("Compute cache key"),
        );
        let cache_path = config
            .repository
            .working_directory
            .join(&config.cache.path)
            .display()
            .to_string();
        steps.push(
            Step::uses("actions/cache@v4")
                .with_name("Restore cache")
                .with_input("key", format!("${{{{ env.{var} }}}}"))
                .with_input("path", cache_path)
                .with_input("restore-keys", config.cache.restore_prefixes.join("\n")),
        );
    }

    steps.push(
        Step::run(config.dependencies.command.join(" "))
            .with_name("Install dependencies")
            .with_working_directory(&working_dir),
    );
    steps.push(
        Step::run(config.deploy.command_line().join(" "))
            .with_name("Publish documentation")
            .with_working_directory(&working_dir),
    );

    let mut jobs = IndexMap::new();
    jobs.insert(
        "deploy".to_string(),
        Job {
            name: Some("Publish documentation".to_string()),
            runs_on: DEFAULT_RUNNER.to_string(),
            steps,
        },
    );

    Workflow {
        name: "docs".to_string(),
        on: WorkflowTriggers {
            push: Some(PushTrigger {
                branches: config.trigger.branches.clone(),
                paths: config.trigger.paths.clone(),
            }),
        },
        concurrency: Some(Concurrency {
            group: "${{ github.workflow }}-${{ github.ref }}".to_string(),
            cancel_in_progress: Some(false),
        }),
        permissions: Some(Permissions {
            contents: Some(PermissionLevel::Write),
        }),
        jobs,
    }
}

/// Serialize a workflow to YAML with a generation header
pub fn render_workflow(workflow: &Workflow) -> EmitterResult<String> {
    let yaml =
        serde_yaml::to_string(workflow).map_err(|e| EmitterError::Serialization(e.to_string()))?;

    let header =
        "# Generated by docpub - do not edit manually\n# Regenerate with: docpub workflow\n\n";

    Ok(format!("{header}{yaml}"))
}
