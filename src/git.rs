//! Git synchronization adapter.
//!
//! Persists a project's serialized state and source files through an
//! external git remote. All operations shell out to the `git` binary and
//! rely on ambient credentials for authentication.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::error::SyncError;

/// Remote name used for project synchronization.
const REMOTE_NAME: &str = "origin";

/// A git working tree rooted at a project's working directory.
pub struct GitRepo {
    workdir: PathBuf,
}

impl GitRepo {
    pub fn new(workdir: &Path) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
        }
    }

    /// Run a git subcommand in the working directory, capturing output.
    ///
    /// `operation` names the step for error reporting.
    async fn run_git(&self, operation: &str, args: &[&str]) -> Result<String, SyncError> {
        tracing::debug!(operation, ?args, "running git");

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            // git reports some failures on stdout only (e.g. "nothing to
            // commit"), so fall back to it when stderr is empty.
            let mut detail = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if detail.is_empty() {
                detail = String::from_utf8_lossy(&output.stdout).trim().to_string();
            }
            return Err(SyncError::GitFailed {
                operation: operation.to_string(),
                stderr: detail,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Initialize a git working tree.
    pub async fn init(&self) -> Result<(), SyncError> {
        self.run_git("init", &["init"]).await?;
        Ok(())
    }

    /// Configured URL of the `origin` remote, if any.
    pub async fn remote_url(&self) -> Option<String> {
        self.run_git("remote get-url", &["remote", "get-url", REMOTE_NAME])
            .await
            .ok()
            .filter(|url| !url.is_empty())
    }

    /// Associate `url` as the `origin` remote.
    ///
    /// An existing remote with a different URL is rejected; re-setting the
    /// identical URL is a no-op.
    pub async fn set_remote(&self, url: &str) -> Result<(), SyncError> {
        if let Some(configured) = self.remote_url().await {
            if configured == url {
                return Ok(());
            }
            return Err(SyncError::RemoteConflict {
                configured,
                requested: url.to_string(),
            });
        }

        self.run_git("remote add", &["remote", "add", REMOTE_NAME, url])
            .await?;
        tracing::info!(url, "configured project remote");
        Ok(())
    }

    /// Fetch and fast-forward merge remote content.
    ///
    /// Succeeds when the remote has no new content; fails on conflicts or
    /// an unreachable remote.
    pub async fn pull(&self, branch: &str) -> Result<(), SyncError> {
        self.run_git("pull", &["pull", "--ff-only", REMOTE_NAME, branch])
            .await?;
        tracing::info!(branch, "pulled remote content");
        Ok(())
    }

    /// Stage `files`, commit with `message`, and push to `branch`.
    ///
    /// A commit with no staged changes is tolerated; the push still runs so
    /// an earlier unpushed commit can land.
    pub async fn push(&self, branch: &str, message: &str, files: &[String]) -> Result<(), SyncError> {
        let mut add_args = vec!["add"];
        add_args.extend(files.iter().map(String::as_str));
        self.run_git("add", &add_args).await?;

        match self.run_git("commit", &["commit", "-m", message]).await {
            Ok(_) => {}
            Err(SyncError::GitFailed { stderr, .. })
                if stderr.contains("nothing to commit")
                    || stderr.contains("nothing added to commit") => {}
            Err(e) => return Err(e),
        }

        self.run_git("push", &["push", REMOTE_NAME, branch]).await?;
        tracing::info!(branch, files = files.len(), "pushed project state");
        Ok(())
    }
}
