use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for hermes
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Root directory repositories are cloned under
    #[serde(default = "default_repo_path")]
    pub repo_path: String,

    /// Directory holding the registry cache, credentials and target file
    #[serde(default = "default_state_path")]
    pub config_path: String,

    #[serde(default = "default_cache_file")]
    pub cache_file: String,

    #[serde(default = "default_credentials_file")]
    pub credentials_file: String,

    /// File the shell alias reads the jump target from
    #[serde(default = "default_target_file")]
    pub target_file: String,

    /// Name of the shell function printed by `hermes alias`
    #[serde(default = "default_alias_name")]
    pub alias_name: String,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote API client settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RemoteConfig {
    /// Timeout for a single page request in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Page size requested from remote APIs
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"
}

// Default value functions
fn default_repo_path() -> String {
    "${HOME}/hermes-repos".to_string()
}
fn default_state_path() -> String {
    "${HOME}/.hermes".to_string()
}
fn default_cache_file() -> String {
    "cache.json".to_string()
}
fn default_credentials_file() -> String {
    "credentials.yml".to_string()
}
fn default_target_file() -> String {
    ".hermes_target".to_string()
}
fn default_alias_name() -> String {
    "hermes".to_string()
}
fn default_timeout() -> u64 {
    30
}
fn default_per_page() -> u32 {
    100
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            per_page: default_per_page(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default location or create a default config
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_or_create(&config_path)
    }

    /// Load configuration from `path`, writing a default file there first if
    /// none exists
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }

        let mut config = Self::default();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        config.save(path)?;
        tracing::info!("Created default configuration at: {:?}", path);

        config.expand_paths()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_paths()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("hermes").join("config.yml"))
    }

    /// Expand `~` and environment variables in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.repo_path = shellexpand::full(&self.repo_path)
            .context("Failed to expand repo_path")?
            .into_owned();

        self.config_path = shellexpand::full(&self.config_path)
            .context("Failed to expand config_path")?
            .into_owned();

        Ok(())
    }

    pub fn repo_root(&self) -> PathBuf {
        PathBuf::from(&self.repo_path)
    }

    pub fn state_dir(&self) -> PathBuf {
        PathBuf::from(&self.config_path)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.state_dir().join(&self.cache_file)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.state_dir().join(&self.credentials_file)
    }

    pub fn target_path(&self) -> PathBuf {
        self.state_dir().join(&self.target_file)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.timeout)
    }

    /// Create the state directory
    pub fn setup(&self) -> Result<()> {
        let dir = self.state_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create state directory: {:?}", dir))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo_path: default_repo_path(),
            config_path: default_state_path(),
            cache_file: default_cache_file(),
            credentials_file: default_credentials_file(),
            target_file: default_target_file(),
            alias_name: default_alias_name(),
            remote: RemoteConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Open a state file for reading and writing, creating it and its parent
/// directory when missing
pub fn open_state_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("Failed to open {:?}", path))
}
