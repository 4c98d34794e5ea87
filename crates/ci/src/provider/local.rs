use super::{CIContext, CIProvider, git_diff_names, git_query};
use async_trait::async_trait;
use docpub_core::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Local git checkout, used when no CI environment is detected
pub struct LocalProvider {
    context: CIContext,
    root: Option<PathBuf>,
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::from_repo(None)
    }
}

impl LocalProvider {
    fn from_repo(root: Option<PathBuf>) -> Self {
        let dir = root.as_deref();
        let ref_name = git_query(dir, &["rev-parse", "--abbrev-ref", "HEAD"])
            .unwrap_or_else(|| "current".to_string());
        let sha = git_query(dir, &["rev-parse", "HEAD"]).unwrap_or_default();
        Self {
            context: CIContext {
                provider: "local".to_string(),
                event: "push".to_string(),
                ref_name,
                sha,
            },
            root,
        }
    }

    /// Provider for the repository at `root` instead of the current directory
    #[must_use]
    pub fn for_repo(root: impl Into<PathBuf>) -> Self {
        Self::from_repo(Some(root.into()))
    }

    fn dir(&self) -> Option<&Path> {
        self.root.as_deref()
    }
}

#[async_trait]
impl CIProvider for LocalProvider {
    fn detect() -> Option<Self> {
        // Always available as fallback
        Some(Self::default())
    }

    fn context(&self) -> &CIContext {
        &self.context
    }

    async fn changed_files(&self) -> Result<Vec<String>> {
        let mut changed: BTreeSet<String> = BTreeSet::new();

        // Committed changes of the last commit
        if let Some(files) = git_diff_names(self.dir(), "HEAD^..HEAD") {
            changed.extend(files);
        }

        // Always include uncommitted changes (staged + unstaged)
        if let Some(files) = git_diff_names(self.dir(), "HEAD") {
            changed.extend(files);
        }

        Ok(changed.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use tempfile::TempDir;

    fn git(dir: &Path, args: &[&str]) -> bool {
        Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(args)
            .env("GIT_AUTHOR_NAME", "test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Repository with two commits on `main`; `None` when git is unavailable
    fn repo_with_history() -> Option<TempDir> {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        if !git(dir, &["init", "-q", "-b", "main"]) {
            return None;
        }
        std::fs::write(dir.join("readme.md"), "hi").unwrap();
        git(dir, &["add", "."]);
        git(dir, &["commit", "-q", "-m", "initial"]);
        std::fs::create_dir_all(dir.join("docs")).unwrap();
        std::fs::write(dir.join("docs/index.md"), "# Docs").unwrap();
        git(dir, &["add", "."]);
        git(dir, &["commit", "-q", "-m", "docs"]);
        Some(tmp)
    }

    #[test]
    fn test_local_provider_detect() {
        let provider = LocalProvider::detect().unwrap();
        let ctx = provider.context();
        assert_eq!(ctx.provider, "local");
        assert_eq!(ctx.event, "push");
    }

    #[tokio::test]
    async fn test_last_commit_and_uncommitted_changes() {
        let Some(repo) = repo_with_history() else {
            return;
        };
        std::fs::write(repo.path().join("readme.md"), "edited").unwrap();

        let provider = LocalProvider::for_repo(repo.path());
        assert_eq!(provider.context().ref_name, "main");
        assert_eq!(provider.context().sha.len(), 40);

        let files = provider.changed_files().await.unwrap();
        assert_eq!(files, vec!["docs/index.md", "readme.md"]);

        let event = provider.trigger_event().await.unwrap();
        assert_eq!(event.branch, "main");
        assert!(event.changed_paths.contains("docs/index.md"));
    }
}
