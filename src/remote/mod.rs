//! Remote drivers
//!
//! A [`Driver`] lists every repository an authenticated user can reach on
//! one remote API family. Drivers are built by name through a
//! [`DriverRegistry`], so new remote types can be added without touching
//! the sync flow.
//!
//! - [`github`]: GitHub and GitHub Enterprise (`/user/repos`)
//! - [`gitlab`]: GitLab (`/api/v4/projects`)

pub mod github;
pub mod gitlab;
mod pagination;

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::error::DriverError;

pub use github::GitHub;
pub use gitlab::GitLab;

/// Default client-side timeout for a single page request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default page size requested from remote APIs
pub const DEFAULT_PER_PAGE: u32 = 100;

/// Credentials handed to a driver
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Auth {
    pub username: String,
    pub password: String,
    pub token: String,
}

impl Auth {
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Default::default()
        }
    }
}

/// Kind of credential a driver expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    Token,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::Token => "token",
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options passed to a driver constructor
#[derive(Debug, Clone)]
pub struct DriverOpts {
    /// List every reachable repository, not only the user's own
    pub all_repos: bool,
    pub auth: Option<Auth>,
    pub timeout: Duration,
    pub per_page: u32,
}

impl Default for DriverOpts {
    fn default() -> Self {
        Self {
            all_repos: false,
            auth: None,
            timeout: DEFAULT_TIMEOUT,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// A driver's normalized view of one remote repository
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RepoDescriptor {
    /// Browser URL, e.g. `https://github.com/org/name`
    pub url: String,
    /// Fully-qualified name, e.g. `github.com/org/name`
    pub name: String,
    pub clone_url: String,
    pub ssh_url: String,
}

impl RepoDescriptor {
    /// Build a descriptor, deriving the fully-qualified name from `url`
    pub fn from_url(url: String, clone_url: String, ssh_url: String) -> Self {
        let name = url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&url)
            .trim_end_matches('/')
            .to_string();

        Self {
            url,
            name,
            clone_url,
            ssh_url,
        }
    }
}

/// Client for one remote API family
#[async_trait]
pub trait Driver: Send + Sync {
    /// Point the driver at `host`, normalizing known SaaS hosts
    fn set_host(&mut self, host: &str);

    /// Store credentials for subsequent requests
    fn authenticate(&mut self, auth: Auth);

    fn auth_type(&self) -> AuthType;

    /// Fetch every page of the repository listing
    async fn get_repos(&self) -> Result<Vec<RepoDescriptor>, DriverError>;
}

/// Constructor stored in a [`DriverRegistry`]
pub type DriverFactory =
    Box<dyn Fn(DriverOpts) -> Result<Box<dyn Driver>, DriverError> + Send + Sync>;

/// Name-keyed driver constructors
pub struct DriverRegistry {
    factories: HashMap<String, DriverFactory>,
}

impl DriverRegistry {
    /// An empty registry with no drivers
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry with the built-in `github` and `gitlab` drivers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_driver("github", github::create);
        registry.register_driver("gitlab", gitlab::create);
        registry
    }

    /// Insert or replace the constructor for `name`
    pub fn register_driver<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(DriverOpts) -> Result<Box<dyn Driver>, DriverError> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Build a driver of type `driver_type`
    pub fn new_driver(
        &self,
        driver_type: &str,
        opts: DriverOpts,
    ) -> Result<Box<dyn Driver>, DriverError> {
        let factory = self
            .factories
            .get(driver_type)
            .ok_or_else(|| DriverError::NotImplemented(driver_type.to_string()))?;

        factory(opts)
    }

    /// Registered driver names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
