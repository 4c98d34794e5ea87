//! Configuration for the docs publisher
//!
//! Read from an optional `docpub.toml`. Every section has defaults, so an empty
//! file (or no file at all) reproduces the stock MkDocs Material publishing
//! workflow: push to `main` touching `docs/**`, Poetry toolchain, a weekly
//! `mkdocs-material-` cache, and `mkdocs gh-deploy --force`.

use crate::identity::CommitIdentity;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Default configuration file name looked up in the workspace root
pub const CONFIG_FILE_NAME: &str = "docpub.toml";

/// Top-level publisher configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, rename_all = "kebab-case")]
pub struct PublisherConfig {
    /// Which push events qualify
    pub trigger: TriggerConfig,
    /// Where the source comes from and where steps run
    pub repository: RepositoryConfig,
    /// Identity for commits created by the deploy step
    pub identity: CommitIdentity,
    /// Tools that must be available before installing dependencies
    pub toolchain: ToolchainConfig,
    /// Weekly build cache
    pub cache: CacheConfig,
    /// Dependency installation step
    pub dependencies: DependenciesConfig,
    /// Build-and-publish step
    pub deploy: DeployConfig,
}

/// Trigger filter configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct TriggerConfig {
    /// Branch patterns that qualify (exact names or globs)
    pub branches: Vec<String>,
    /// Path patterns; at least one changed path must match
    pub paths: Vec<String>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            branches: vec!["main".to_string()],
            paths: vec!["docs/**".to_string()],
        }
    }
}

/// Repository and working directory configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct RepositoryConfig {
    /// Remote to clone when the workspace has no checkout yet.
    /// Detected from the CI environment when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    /// Host the token authenticates against
    pub host: String,
    /// Directory, relative to the checkout, where every step runs
    pub working_directory: PathBuf,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            remote: None,
            host: "https://github.com".to_string(),
            working_directory: PathBuf::from("docs"),
        }
    }
}

/// A tool that is probed and installed on demand
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ToolSpec {
    /// Display name
    pub name: String,
    /// Command that succeeds when the tool is usable; its output is the version
    pub probe: Vec<String>,
    /// Command that installs the tool; a missing tool without one is fatal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<Vec<String>>,
}

/// Toolchain configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ToolchainConfig {
    /// Tools in provisioning order
    pub tools: Vec<ToolSpec>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            tools: vec![
                ToolSpec {
                    name: "poetry".to_string(),
                    probe: vec!["poetry".to_string(), "--version".to_string()],
                    install: Some(vec![
                        "pipx".to_string(),
                        "install".to_string(),
                        "poetry".to_string(),
                    ]),
                },
                ToolSpec {
                    name: "python".to_string(),
                    probe: vec!["python3".to_string(), "--version".to_string()],
                    install: None,
                },
            ],
        }
    }
}

/// Build cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheConfig {
    /// Whether restore/save run at all
    pub enabled: bool,
    /// Fixed key prefix; the ISO week number is appended
    pub prefix: String,
    /// Prefixes tried, in order, when the exact key misses
    pub restore_prefixes: Vec<String>,
    /// Cached directory, relative to the working directory
    pub path: PathBuf,
    /// Environment variable that receives the computed key
    pub env_var: String,
    /// Cache store root; resolved from the environment when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: "mkdocs-material-".to_string(),
            restore_prefixes: vec!["mkdocs-material-".to_string()],
            path: PathBuf::from(".cache"),
            env_var: "cache_id".to_string(),
            root: None,
        }
    }
}

/// Dependency installation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct DependenciesConfig {
    /// Install command
    pub command: Vec<String>,
}

impl Default for DependenciesConfig {
    fn default() -> Self {
        Self {
            command: vec!["poetry".to_string(), "install".to_string()],
        }
    }
}

/// Build-and-publish configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct DeployConfig {
    /// Deploy command; it must build the site and force-push it
    pub command: Vec<String>,
    /// Hosting branch that receives the built site
    pub remote_branch: String,
}

/// Branch `mkdocs gh-deploy` pushes to unless told otherwise
pub const DEFAULT_HOSTING_BRANCH: &str = "gh-pages";

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "poetry".to_string(),
                "run".to_string(),
                "mkdocs".to_string(),
                "gh-deploy".to_string(),
                "--force".to_string(),
            ],
            remote_branch: DEFAULT_HOSTING_BRANCH.to_string(),
        }
    }
}

impl DeployConfig {
    /// Full deploy command line, including `--remote-branch` when the hosting
    /// branch is not the default one.
    #[must_use]
    pub fn command_line(&self) -> Vec<String> {
        let mut cmd = self.command.clone();
        if self.remote_branch != DEFAULT_HOSTING_BRANCH
            && !cmd.iter().any(|a| a == "--remote-branch" || a == "-b")
        {
            cmd.push("--remote-branch".to_string());
            cmd.push(self.remote_branch.clone());
        }
        cmd
    }
}

impl PublisherConfig {
    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| Error::configuration(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(e, path, "read"))?;
        tracing::debug!(path = %path.display(), "Loaded configuration file");
        Self::from_toml_str(&text)
    }

    /// Load `docpub.toml` from `dir` if it exists, otherwise use defaults
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            tracing::debug!(dir = %dir.display(), "No configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Reject configurations that cannot describe a runnable pipeline
    pub fn validate(&self) -> Result<()> {
        if self.trigger.branches.is_empty() {
            return Err(Error::configuration("trigger.branches must not be empty"));
        }
        if self.trigger.paths.is_empty() {
            return Err(Error::configuration("trigger.paths must not be empty"));
        }
        let working_directory = &self.repository.working_directory;
        if working_directory.is_absolute()
            || working_directory
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(Error::configuration(
                "repository.working-directory must be relative to the checkout and stay inside it",
            ));
        }
        for tool in &self.toolchain.tools {
            if tool.probe.is_empty() {
                return Err(Error::configuration(format!(
                    "toolchain tool '{}' has an empty probe command",
                    tool.name
                )));
            }
            if tool.install.as_ref().is_some_and(Vec::is_empty) {
                return Err(Error::configuration(format!(
                    "toolchain tool '{}' has an empty install command",
                    tool.name
                )));
            }
        }
        if self.cache.enabled {
            if self.cache.prefix.is_empty() {
                return Err(Error::configuration("cache.prefix must not be empty"));
            }
            if self.cache.prefix.contains(['/', '\\']) {
                return Err(Error::configuration(
                    "cache.prefix must not contain path separators",
                ));
            }
            if self.cache.env_var.is_empty() {
                return Err(Error::configuration("cache.env-var must not be empty"));
            }
        }
        if self.dependencies.command.is_empty() {
            return Err(Error::configuration("dependencies.command must not be empty"));
        }
        if self.deploy.command.is_empty() {
            return Err(Error::configuration("deploy.command must not be empty"));
        }
        if self.deploy.remote_branch.is_empty() {
            return Err(Error::configuration("deploy.remote-branch must not be empty"));
        }
        Ok(())
    }

    /// Absolute directory the steps run in for a given checkout root
    #[must_use]
    pub fn step_dir(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.repository.working_directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_reproduce_stock_workflow() {
        let config = PublisherConfig::default();
        assert_eq!(config.trigger.branches, vec!["main"]);
        assert_eq!(config.trigger.paths, vec!["docs/**"]);
        assert_eq!(config.repository.working_directory, PathBuf::from("docs"));
        assert_eq!(config.cache.prefix, "mkdocs-material-");
        assert_eq!(config.cache.restore_prefixes, vec!["mkdocs-material-"]);
        assert_eq!(config.cache.path, PathBuf::from(".cache"));
        assert_eq!(config.cache.env_var, "cache_id");
        assert_eq!(config.dependencies.command, vec!["poetry", "install"]);
        assert_eq!(
            config.deploy.command_line(),
            vec!["poetry", "run", "mkdocs", "gh-deploy", "--force"]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = PublisherConfig::from_toml_str("").unwrap();
        assert_eq!(config, PublisherConfig::default());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = PublisherConfig::from_toml_str(
            r#"
            [trigger]
            branches = ["trunk"]

            [cache]
            prefix = "site-"
            "#,
        )
        .unwrap();
        assert_eq!(config.trigger.branches, vec!["trunk"]);
        assert_eq!(config.trigger.paths, vec!["docs/**"]);
        assert_eq!(config.cache.prefix, "site-");
        assert_eq!(config.cache.env_var, "cache_id");
    }

    #[test]
    fn test_unknown_field_type_is_configuration_error() {
        let err = PublisherConfig::from_toml_str("[trigger]\nbranches = 3").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_validate_rejects_absolute_working_directory() {
        let mut config = PublisherConfig::default();
        config.repository.working_directory = PathBuf::from("/docs");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_prefix_with_separator() {
        let mut config = PublisherConfig::default();
        config.cache.prefix = "a/b-".to_string();
        assert!(config.validate().is_err());

        config.cache.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_commands() {
        let mut config = PublisherConfig::default();
        config.deploy.command.clear();
        assert!(config.validate().is_err());

        let mut config = PublisherConfig::default();
        config.toolchain.tools[0].install = Some(vec![]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_remote_branch_appended_when_not_default() {
        let deploy = DeployConfig {
            remote_branch: "site".to_string(),
            ..Default::default()
        };
        let cmd = deploy.command_line();
        assert_eq!(&cmd[cmd.len() - 2..], ["--remote-branch", "site"]);
    }

    #[test]
    fn test_step_dir() {
        let config = PublisherConfig::default();
        assert_eq!(
            config.step_dir(Path::new("/work")),
            PathBuf::from("/work/docs")
        );
    }
}
