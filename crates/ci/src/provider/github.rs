use super::{CIContext, CIProvider, git, git_diff_names, git_query};
use async_trait::async_trait;
use docpub_core::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// GitHub Actions environment
pub struct GitHubProvider {
    context: CIContext,
    server_url: String,
    repository: String,
    event_path: Option<PathBuf>,
    env_file: Option<PathBuf>,
    summary_file: Option<PathBuf>,
    root: Option<PathBuf>,
}

const NULL_SHA: &str = "0000000000000000000000000000000000000000";

/// The parts of the webhook payload at `GITHUB_EVENT_PATH` we read
#[derive(Debug, Default, Deserialize)]
struct PushPayload {
    #[serde(default)]
    before: Option<String>,
    #[serde(default)]
    commits: Vec<PushCommit>,
}

#[derive(Debug, Default, Deserialize)]
struct PushCommit {
    #[serde(default)]
    added: Vec<String>,
    #[serde(default)]
    modified: Vec<String>,
    #[serde(default)]
    removed: Vec<String>,
}

impl PushPayload {
    fn load(path: &Path) -> Option<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| debug!("Cannot read event payload {}: {e}", path.display()))
            .ok()?;
        serde_json::from_str(&text)
            .map_err(|e| debug!("Cannot parse event payload {}: {e}", path.display()))
            .ok()
    }

    /// Paths touched by the pushed commits, `None` when the payload lists none
    fn changed_paths(&self) -> Option<BTreeSet<String>> {
        let paths: BTreeSet<String> = self
            .commits
            .iter()
            .flat_map(|c| c.added.iter().chain(&c.modified).chain(&c.removed))
            .cloned()
            .collect();
        (!paths.is_empty()).then_some(paths)
    }

    fn before_sha(&self) -> Option<&str> {
        self.before
            .as_deref()
            .filter(|sha| *sha != NULL_SHA && !sha.is_empty())
    }
}

impl GitHubProvider {
    /// Run git in the checkout at `root` instead of the current directory
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    fn dir(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn is_shallow_clone(&self) -> bool {
        git_query(self.dir(), &["rev-parse", "--is-shallow-repository"]).as_deref() == Some("true")
    }

    fn fetch_ref(&self, refspec: &str) -> bool {
        debug!("Fetching ref: {refspec}");
        git(self.dir())
            .args(["fetch", "--depth=1", "origin", refspec])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn get_before_sha(payload: Option<&PushPayload>) -> Option<String> {
        payload
            .and_then(PushPayload::before_sha)
            .map(str::to_string)
            .or_else(|| {
                std::env::var("GITHUB_BEFORE")
                    .ok()
                    .filter(|sha| sha != NULL_SHA && !sha.is_empty())
            })
    }

    fn append_line(file: &Path, content: &str) -> Result<()> {
        let mut handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file)
            .map_err(|e| Error::io(e, file, "open"))?;
        writeln!(handle, "{content}").map_err(|e| Error::io(e, file, "append"))
    }
}

#[async_trait]
impl CIProvider for GitHubProvider {
    fn detect() -> Option<Self> {
        if std::env::var("GITHUB_ACTIONS").ok()? != "true" {
            return None;
        }

        let ref_name = std::env::var("GITHUB_REF_NAME")
            .ok()
            .filter(|r| !r.is_empty())
            .or_else(|| std::env::var("GITHUB_REF").ok())
            .unwrap_or_default();
        let path_var = |name: &str| {
            std::env::var_os(name)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };

        Some(Self {
            context: CIContext {
                provider: "github".to_string(),
                event: std::env::var("GITHUB_EVENT_NAME").unwrap_or_default(),
                ref_name,
                sha: std::env::var("GITHUB_SHA").unwrap_or_default(),
            },
            server_url: std::env::var("GITHUB_SERVER_URL")
                .unwrap_or_else(|_| "https://github.com".to_string()),
            repository: std::env::var("GITHUB_REPOSITORY").unwrap_or_default(),
            event_path: path_var("GITHUB_EVENT_PATH"),
            env_file: path_var("GITHUB_ENV"),
            summary_file: path_var("GITHUB_STEP_SUMMARY"),
            root: None,
        })
    }

    fn context(&self) -> &CIContext {
        &self.context
    }

    async fn changed_files(&self) -> Result<Vec<String>> {
        let payload = self.event_path.as_deref().and_then(PushPayload::load);

        // Strategy 1: the push payload lists every touched path
        if let Some(paths) = payload.as_ref().and_then(PushPayload::changed_paths) {
            debug!("Using {} paths from the push payload", paths.len());
            return Ok(paths.into_iter().collect());
        }

        let is_shallow = self.is_shallow_clone();
        debug!("Shallow clone detected: {is_shallow}");

        // Strategy 2: the push's before SHA
        if let Some(before_sha) = Self::get_before_sha(payload.as_ref()) {
            debug!("Push event detected, before: {before_sha}");

            if is_shallow {
                self.fetch_ref(&before_sha);
            }

            if let Some(files) = git_diff_names(self.dir(), &format!("{before_sha}..HEAD")) {
                return Ok(files);
            }
        }

        // Strategy 3: compare against the parent commit
        if let Some(files) = git_diff_names(self.dir(), "HEAD^..HEAD") {
            debug!("Using HEAD^ comparison");
            return Ok(files);
        }

        // Unknown changes never qualify a push
        warn!(
            "Could not determine changed files (shallow clone: {is_shallow}). \
             Treating the push as touching nothing. Set 'fetch-depth: 2' \
             for push events to avoid this."
        );
        Ok(Vec::new())
    }

    fn remote_url(&self) -> Option<String> {
        (!self.repository.is_empty()).then(|| {
            format!(
                "{}/{}.git",
                self.server_url.trim_end_matches('/'),
                self.repository
            )
        })
    }

    fn export_env(&self, name: &str, value: &str) -> Result<()> {
        match &self.env_file {
            Some(file) => {
                debug!(name, "Exporting variable to GITHUB_ENV");
                Self::append_line(file, &format!("{name}={value}"))
            }
            None => Ok(()),
        }
    }

    fn publish_summary(&self, markdown: &str) -> Result<()> {
        match &self.summary_file {
            Some(file) => Self::append_line(file, markdown),
            None => Ok(()),
        }
    }
}
