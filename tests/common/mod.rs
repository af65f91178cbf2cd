//! Common test utilities and helpers for hermes tests
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Result};
use hermes::Prompter;
use serde_json::{json, Value};
use tempfile::TempDir;

/// Isolated config, state and repository directories for one test
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub state_dir: PathBuf,
    pub repo_root: PathBuf,
    pub config_path: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let state_dir = temp_dir.path().join("state");
        let repo_root = temp_dir.path().join("repos");
        let config_path = temp_dir.path().join("hermes").join("config.yml");

        std::fs::create_dir_all(config_path.parent().unwrap())
            .expect("Failed to create config dir");
        std::fs::create_dir_all(&repo_root).expect("Failed to create repo root");

        let env = Self {
            temp_dir,
            state_dir,
            repo_root,
            config_path,
        };
        env.write_config("");
        env
    }

    /// Write a config pointing into this environment, followed by `extra`
    pub fn write_config(&self, extra: &str) {
        let content = format!(
            "repo_path: \"{}\"\nconfig_path: \"{}\"\n{}",
            self.repo_root.display(),
            self.state_dir.display(),
            extra
        );
        std::fs::write(&self.config_path, content).expect("Failed to write test config");
    }

    pub fn cache_path(&self) -> PathBuf {
        self.state_dir.join("cache.json")
    }

    pub fn target_path(&self) -> PathBuf {
        self.state_dir.join(".hermes_target")
    }

    /// Write a registry document with the given remotes
    pub fn seed_cache(&self, remotes: Value) {
        std::fs::create_dir_all(&self.state_dir).expect("Failed to create state dir");
        let doc = json!({ "version": "0.0.1", "remotes": remotes });
        std::fs::write(self.cache_path(), serde_json::to_vec_pretty(&doc).unwrap())
            .expect("Failed to write cache");
    }

    pub fn read_cache(&self) -> Value {
        let raw = std::fs::read(self.cache_path()).expect("Failed to read cache");
        serde_json::from_slice(&raw).expect("Cache is not JSON")
    }

    /// The hermes binary, pointed at this environment's config
    pub fn hermes(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_hermes"));
        cmd.arg("--config")
            .arg(&self.config_path)
            .env("RUST_LOG", "warn")
            .env_remove("GITHUB_TOKEN");
        cmd
    }
}

/// A registry remote entry with repositories checked out under `root`
pub fn remote_entry(name: &str, remote_type: &str, root: &Path, repos: &[&str]) -> Value {
    let repos: serde_json::Map<String, Value> = repos
        .iter()
        .map(|repo| {
            let full = format!("{}/{}", name, repo);
            let entry = json!({
                "name": full,
                "repo_path": root.join(&full),
                "clone_url": format!("https://{}.git", full),
                "ssh_url": format!("git@{}:{}.git", name, repo),
            });
            (full, entry)
        })
        .collect();

    json!({
        "name": name,
        "url": format!("https://{}", name),
        "protocol": "https",
        "type": remote_type,
        "meta": {},
        "repos": repos,
    })
}

/// GitHub `/user/repos` page for repositories hosted at `base`
pub fn github_repos(base: &str, owner: &str, names: &[&str]) -> Value {
    let host = base.split_once("://").map(|(_, h)| h).unwrap_or(base);
    Value::Array(
        names
            .iter()
            .map(|name| {
                json!({
                    "name": name,
                    "full_name": format!("{}/{}", owner, name),
                    "html_url": format!("{}/{}/{}", base, owner, name),
                    "clone_url": format!("{}/{}/{}.git", base, owner, name),
                    "ssh_url": format!("git@{}:{}/{}.git", host, owner, name),
                })
            })
            .collect(),
    )
}

/// GitLab `/api/v4/projects` page for projects hosted at `base`
pub fn gitlab_projects(base: &str, group: &str, names: &[&str]) -> Value {
    let host = base.split_once("://").map(|(_, h)| h).unwrap_or(base);
    Value::Array(
        names
            .iter()
            .map(|name| {
                json!({
                    "path_with_namespace": format!("{}/{}", group, name),
                    "web_url": format!("{}/{}/{}", base, group, name),
                    "http_url_to_repo": format!("{}/{}/{}.git", base, group, name),
                    "ssh_url_to_repo": format!("git@{}:{}/{}.git", host, group, name),
                })
            })
            .collect(),
    )
}

/// Prompter answering from fixed scripts and counting token prompts
#[derive(Default)]
pub struct ScriptedPrompter {
    tokens: RefCell<VecDeque<String>>,
    choices: RefCell<VecDeque<usize>>,
    pub token_prompts: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn with_tokens(tokens: &[&str]) -> Self {
        Self {
            tokens: RefCell::new(tokens.iter().map(|t| t.to_string()).collect()),
            ..Default::default()
        }
    }

    pub fn with_choices(mut self, choices: &[usize]) -> Self {
        self.choices = RefCell::new(choices.iter().copied().collect());
        self
    }
}

impl Prompter for ScriptedPrompter {
    fn token(&self, remote: &str) -> Result<String> {
        self.token_prompts.borrow_mut().push(remote.to_string());
        self.tokens
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected token prompt for {}", remote))
    }

    fn select(&self, message: &str, _options: &[String]) -> Result<usize> {
        self.choices
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected prompt: {}", message))
    }
}
