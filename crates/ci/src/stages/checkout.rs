//! Git-backed source acquisition

use super::{CheckoutInfo, FetchRequest, SourceFetcher, is_git_checkout, run_checked, to_args};
use crate::runner::{CommandRunner, CommandSpec};
use async_trait::async_trait;
use docpub_core::{Error, Result};
use std::path::Path;

/// Checks out the triggering commit with the `git` CLI.
///
/// An existing checkout already at the requested commit is used as is; one at
/// another commit fetches it from `origin`. Without a commit the branch head
/// is checked out. A missing checkout is cloned from
/// the request's remote. Shallow repositories are deepened afterwards because
/// publishing needs the hosting branch history.
#[derive(Debug, Clone, Default)]
pub struct GitSourceFetcher {
    runner: CommandRunner,
}

impl GitSourceFetcher {
    /// Fetcher running git through `runner`
    #[must_use]
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    fn git(request: &FetchRequest, cwd: &Path, id: &str, args: &[&str]) -> CommandSpec {
        let mut command = vec!["git".to_string()];
        command.extend(to_args(args));
        CommandSpec::new(id, command, cwd).with_env(request.env.clone())
    }

    async fn query(&self, request: &FetchRequest, args: &[&str]) -> Result<String> {
        let spec = Self::git(request, &request.workspace, "checkout", args).captured();
        let output = run_checked(&self.runner, &spec, Error::fetch).await?;
        Ok(output.stdout.trim().to_string())
    }

    async fn run(&self, request: &FetchRequest, cwd: &Path, args: &[&str]) -> Result<()> {
        let spec = Self::git(request, cwd, "checkout", args);
        run_checked(&self.runner, &spec, Error::fetch).await?;
        Ok(())
    }

    async fn clone_into(&self, request: &FetchRequest) -> Result<()> {
        let Some(remote) = request.remote.as_deref() else {
            return Err(Error::fetch(format!(
                "{} is not a git checkout and no remote is configured",
                request.workspace.display()
            )));
        };
        std::fs::create_dir_all(&request.workspace)
            .map_err(|e| Error::io(e, &request.workspace, "create_dir_all"))?;

        tracing::info!(remote, workspace = %request.workspace.display(), "Cloning repository");
        let mut args = vec!["clone", "--no-tags"];
        if request.sha.is_empty() && !request.branch.is_empty() {
            args.extend(["--branch", request.branch.as_str()]);
        }
        args.extend([remote, "."]);
        self.run(request, &request.workspace, &args).await
    }

    async fn update(&self, request: &FetchRequest) -> Result<()> {
        if request.sha.is_empty() {
            return self.follow_branch(request).await;
        }

        let head = self.query(request, &["rev-parse", "HEAD"]).await.ok();
        if head.as_deref() == Some(request.sha.as_str()) {
            tracing::info!(head = ?head, "Working copy already at the requested commit");
            return Ok(());
        }

        tracing::info!(sha = %request.sha, "Fetching triggering commit");
        self.run(
            request,
            &request.workspace,
            &["fetch", "--no-tags", "--prune", "origin", &request.sha],
        )
        .await
    }

    /// Move an existing checkout to the head of `request.branch`.
    ///
    /// The head comes from `origin` when the checkout has one, else from the
    /// local branch of that name.
    async fn follow_branch(&self, request: &FetchRequest) -> Result<()> {
        let branch = request.branch.as_str();
        if branch.is_empty() {
            tracing::info!("No branch or commit requested, using the working copy as is");
            return Ok(());
        }

        let origin = self
            .query(request, &["remote", "get-url", "origin"])
            .await
            .ok()
            .filter(|url| !url.is_empty());
        if origin.is_some() {
            tracing::info!(branch, "Fetching branch head from origin");
            self.run(
                request,
                &request.workspace,
                &["fetch", "--no-tags", "origin", branch],
            )
            .await?;
            return self
                .run(
                    request,
                    &request.workspace,
                    &["checkout", "--force", "--detach", "FETCH_HEAD"],
                )
                .await;
        }

        let current = self
            .query(request, &["rev-parse", "--abbrev-ref", "HEAD"])
            .await
            .ok();
        if current.as_deref() == Some(branch) {
            tracing::info!(branch, "Working copy already on the requested branch");
            return Ok(());
        }

        tracing::info!(branch, "Switching to the local branch");
        self.run(request, &request.workspace, &["checkout", "--force", branch])
            .await
    }
}

#[async_trait]
impl SourceFetcher for GitSourceFetcher {
    #[tracing::instrument(
        name = "fetch_source",
        skip(self, request),
        fields(workspace = %request.workspace.display(), sha = %request.sha)
    )]
    async fn fetch(&self, request: &FetchRequest) -> Result<CheckoutInfo> {
        let cloned = !is_git_checkout(&request.workspace);
        if cloned {
            self.clone_into(request).await?;
        } else {
            self.update(request).await?;
        }

        if !request.sha.is_empty() {
            self.run(
                request,
                &request.workspace,
                &["checkout", "--force", "--detach", &request.sha],
            )
            .await?;
        }

        let shallow = self
            .query(request, &["rev-parse", "--is-shallow-repository"])
            .await?;
        let unshallowed = shallow == "true";
        if unshallowed {
            tracing::info!("Shallow repository, fetching full history");
            self.run(
                request,
                &request.workspace,
                &["fetch", "--unshallow", "--no-tags", "origin"],
            )
            .await?;
        }

        let head = self.query(request, &["rev-parse", "HEAD"]).await?;
        let sha = if head.is_empty() {
            request.sha.clone()
        } else {
            head
        };

        Ok(CheckoutInfo {
            workspace: request.workspace.clone(),
            sha,
            cloned,
            unshallowed,
        })
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

    fn head(dir: &Path) -> String {
        let out = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(["rev-parse", "HEAD"])
            .output()
            .unwrap();
        String::from_utf8_lossy(&out.stdout).trim().to_string()
    }

    /// Origin repository with two commits; `None` when git is unavailable
    fn origin() -> Option<TempDir> {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        if !git(dir, &["init", "-q", "-b", "main"]) {
            return None;
        }
        std::fs::create_dir_all(dir.join("docs")).unwrap();
        std::fs::write(dir.join("docs/index.md"), "v1").unwrap();
        git(dir, &["add", "."]);
        git(dir, &["commit", "-q", "-m", "one"]);
        std::fs::write(dir.join("docs/index.md"), "v2").unwrap();
        git(dir, &["commit", "-q", "-am", "two"]);
        Some(tmp)
    }

    #[tokio::test]
    async fn clones_missing_workspace_at_sha() {
        let Some(origin) = origin() else {
            return;
        };
        let first = {
            let out = Command::new("git")
                .arg("-C")
                .arg(origin.path())
                .args(["rev-parse", "HEAD~1"])
                .output()
                .unwrap();
            String::from_utf8_lossy(&out.stdout).trim().to_string()
        };

        let target = TempDir::new().unwrap();
        let workspace = target.path().join("checkout");
        let request = FetchRequest {
            workspace: workspace.clone(),
            remote: Some(origin.path().display().to_string()),
            branch: "main".into(),
            sha: first.clone(),
            ..FetchRequest::default()
        };

        let info = GitSourceFetcher::default().fetch(&request).await.unwrap();
        assert!(info.cloned);
        assert!(!info.unshallowed);
        assert_eq!(info.sha, first);
        assert_eq!(
            std::fs::read_to_string(workspace.join("docs/index.md")).unwrap(),
            "v1"
        );
    }

    #[tokio::test]
    async fn existing_checkout_at_head_is_reused() {
        let Some(origin) = origin() else {
            return;
        };
        let request = FetchRequest {
            workspace: origin.path().to_path_buf(),
            branch: "main".into(),
            sha: head(origin.path()),
            ..FetchRequest::default()
        };
        let info = GitSourceFetcher::default().fetch(&request).await.unwrap();
        assert!(!info.cloned);
        assert_eq!(info.sha, head(origin.path()));
    }

    #[tokio::test]
    async fn empty_sha_checks_out_local_branch_head() {
        let Some(repo) = origin() else {
            return;
        };
        let dir = repo.path();
        git(dir, &["checkout", "-q", "-b", "feature/x"]);
        std::fs::write(dir.join("docs/index.md"), "feature").unwrap();
        git(dir, &["commit", "-q", "-am", "feature"]);

        let request = FetchRequest {
            workspace: dir.to_path_buf(),
            branch: "main".into(),
            sha: String::new(),
            ..FetchRequest::default()
        };
        GitSourceFetcher::default().fetch(&request).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.join("docs/index.md")).unwrap(),
            "v2"
        );
    }

    #[tokio::test]
    async fn empty_sha_follows_origin_branch_head() {
        let Some(origin) = origin() else {
            return;
        };
        let target = TempDir::new().unwrap();
        let workspace = target.path().join("checkout");
        std::fs::create_dir_all(&workspace).unwrap();
        if !git(
            &workspace,
            &["clone", "-q", origin.path().to_str().unwrap(), "."],
        ) {
            return;
        }
        git(&workspace, &["checkout", "-q", "-b", "feature/x"]);
        std::fs::write(workspace.join("docs/index.md"), "feature").unwrap();
        git(&workspace, &["commit", "-q", "-am", "feature"]);

        std::fs::write(origin.path().join("docs/index.md"), "v3").unwrap();
        git(origin.path(), &["commit", "-q", "-am", "three"]);

        let request = FetchRequest {
            workspace: workspace.clone(),
            branch: "main".into(),
            sha: String::new(),
            ..FetchRequest::default()
        };
        let info = GitSourceFetcher::default().fetch(&request).await.unwrap();
        assert!(!info.cloned);
        assert_eq!(info.sha, head(origin.path()));
        assert_eq!(
            std::fs::read_to_string(workspace.join("docs/index.md")).unwrap(),
            "v3"
        );
    }

    #[tokio::test]
    async fn missing_workspace_without_remote_is_fetch_error() {
        let target = TempDir::new().unwrap();
        let request = FetchRequest {
            workspace: target.path().join("nowhere"),
            branch: "main".into(),
            ..FetchRequest::default()
        };
        let err = GitSourceFetcher::default().fetch(&request).await.unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
    }

    #[tokio::test]
    async fn unreachable_remote_is_fetch_error() {
        let target = TempDir::new().unwrap();
        let request = FetchRequest {
            workspace: target.path().join("checkout"),
            remote: Some(target.path().join("no-such-repo").display().to_string()),
            branch: "main".into(),
            ..FetchRequest::default()
        };
        let err = GitSourceFetcher::default().fetch(&request).await.unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
    }
}
