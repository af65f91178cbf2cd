use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, info};

use crate::registry::{Protocol, Repository};

/// What to clone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneOptions {
    pub url: String,
}

/// Result of a clone request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneOutcome {
    Cloned,
    /// The destination already held a non-empty directory
    AlreadyPresent,
}

/// Materializes a repository at a path
#[async_trait]
pub trait Cloner {
    async fn clone_repo(&self, path: &Path, opts: &CloneOptions) -> Result<CloneOutcome>;
}

/// Cloner that shells out to the system `git`
#[derive(Debug, Clone)]
pub struct GitCloner {
    git: String,
}

impl Default for GitCloner {
    fn default() -> Self {
        Self {
            git: "git".to_string(),
        }
    }
}

impl GitCloner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific git executable
    pub fn with_binary(git: impl Into<String>) -> Self {
        Self { git: git.into() }
    }
}

#[async_trait]
impl Cloner for GitCloner {
    async fn clone_repo(&self, path: &Path, opts: &CloneOptions) -> Result<CloneOutcome> {
        if is_populated(path) {
            debug!("{} already exists, skipping clone", path.display());
            return Ok(CloneOutcome::AlreadyPresent);
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create parent directory")?;
        }

        info!("Cloning {} -> {}", opts.url, path.display());

        let output = AsyncCommand::new(&self.git)
            .args(["clone", "--quiet", opts.url.as_str()])
            .arg(path)
            .output()
            .await
            .context("Failed to execute git clone")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("already exists and is not an empty directory") {
                return Ok(CloneOutcome::AlreadyPresent);
            }
            return Err(anyhow!("Git clone failed: {}", stderr.trim()));
        }

        Ok(CloneOutcome::Cloned)
    }
}

fn is_populated(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Pick the URL to clone `repo` with under `protocol`
///
/// Falls back to the other recorded URL, then to `https://<name>`.
pub fn clone_url(repo: &Repository, protocol: Protocol) -> String {
    let preferred = match protocol {
        Protocol::Ssh => [&repo.ssh_url, &repo.clone_url],
        Protocol::Https | Protocol::Http => [&repo.clone_url, &repo.ssh_url],
    };

    let url = preferred
        .into_iter()
        .find(|url| !url.is_empty())
        .cloned()
        .unwrap_or_else(|| format!("https://{}", repo.name));

    match protocol {
        Protocol::Http => match url.strip_prefix("https://") {
            Some(rest) => format!("http://{}", rest),
            None => url,
        },
        _ => url,
    }
}
