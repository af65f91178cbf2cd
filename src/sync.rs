//! Remote Sync - drives drivers and folds their results into the registry
//!
//! One remote is synced at a time. Each sync walks a small auth state
//! machine: credentials are loaded (or prompted for and stored), the driver
//! fetches every page, and an auth rejection evicts the stored credential
//! and re-prompts exactly once before the remote is given up on.

use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::credentials::{Credential, CredentialStorer};
use crate::error::{CredentialError, DriverError, RegistryError, SyncError};
use crate::prompt::Prompter;
use crate::registry::{Protocol, Registry, Repository};
use crate::remote::{Auth, AuthType, DriverOpts, DriverRegistry, RepoDescriptor};
use crate::store::Storer;

/// Options for adding (or re-syncing) one remote
#[derive(Debug, Clone, Default)]
pub struct RemoteOptions {
    /// Driver type; prompted for when the remote is new and this is unset
    pub remote_type: Option<String>,
    /// Clone protocol; prompted for when the remote is new and this is unset
    pub protocol: Option<Protocol>,
    pub all_repos: bool,
    /// Token stored for the remote before fetching
    pub token: Option<String>,
}

/// Options for refreshing every known remote
#[derive(Debug, Clone, Default)]
pub struct RefreshOptions {
    pub all_repos: bool,
    /// Overrides the stored protocol of every refreshed remote
    pub protocol: Option<Protocol>,
}

/// Results from refreshing every remote
#[derive(Debug, Clone, Default)]
pub struct RefreshSummary {
    /// Remote name and the number of repositories it added
    pub refreshed: Vec<(String, usize)>,
    /// Remote name and the reason it failed
    pub failed: Vec<(String, String)>,
    pub duration: Duration,
}

impl RefreshSummary {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn new_repositories(&self) -> usize {
        self.refreshed.iter().map(|(_, added)| added).sum()
    }
}

enum AuthState {
    Unauthenticated,
    Fetching,
    AuthExpired,
    Done(Vec<RepoDescriptor>),
}

/// Split a user-supplied remote URL into its registry name and canonical URL
///
/// A missing scheme defaults to `https`. The name is the host, plus the port
/// when one is given explicitly.
pub fn parse_remote_url(input: &str) -> Result<(String, String), SyncError> {
    let input = input.trim();
    let with_scheme = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };

    let url = Url::parse(&with_scheme).map_err(|_| SyncError::InvalidRemote(input.to_string()))?;
    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| SyncError::InvalidRemote(input.to_string()))?;

    let name = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    Ok((name, url.as_str().trim_end_matches('/').to_string()))
}

/// Syncs remotes into a registry
pub struct RemoteSync<'a, S: Storer> {
    registry: &'a mut Registry<S>,
    credentials: &'a mut dyn CredentialStorer,
    prompter: &'a dyn Prompter,
    drivers: &'a DriverRegistry,
    repo_root: PathBuf,
    timeout: Duration,
    per_page: u32,
}

impl<'a, S: Storer> RemoteSync<'a, S> {
    pub fn new(
        registry: &'a mut Registry<S>,
        credentials: &'a mut dyn CredentialStorer,
        prompter: &'a dyn Prompter,
        drivers: &'a DriverRegistry,
        repo_root: impl Into<PathBuf>,
    ) -> Self {
        let defaults = DriverOpts::default();
        Self {
            registry,
            credentials,
            prompter,
            drivers,
            repo_root: repo_root.into(),
            timeout: defaults.timeout,
            per_page: defaults.per_page,
        }
    }

    /// Client-side timeout for each page request
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    /// Fetch every repository on `url` and record them
    ///
    /// New remotes are registered only after a successful fetch. A known
    /// remote keeps its type; an explicit protocol replaces the stored one.
    /// Returns the number of repositories that were not already known.
    pub async fn add_remote(&mut self, url: &str, opts: &RemoteOptions) -> Result<usize, SyncError> {
        let (name, url) = parse_remote_url(url)?;

        let cached_type = self
            .registry
            .search_remote(&name)
            .map(|remote| remote.remote_type.clone())
            .filter(|remote_type| !remote_type.is_empty());
        let known = self.registry.search_remote(&name).is_some();

        let remote_type = match cached_type.or_else(|| opts.remote_type.clone()) {
            Some(remote_type) => remote_type,
            None => self.select_driver(&name)?,
        };

        if let Some(token) = &opts.token {
            self.credentials.put(&name, Credential::token(token))?;
        }

        let descriptors = self.fetch(&name, &url, &remote_type, opts.all_repos).await?;
        info!("Fetched {} repositories from {}", descriptors.len(), name);

        if known {
            if let Some(remote) = self.registry.remote_mut(&name) {
                if let Some(protocol) = opts.protocol {
                    debug!("Setting protocol of {} to {}", name, protocol);
                    remote.protocol = protocol;
                }
                if remote.remote_type.is_empty() {
                    remote.remote_type = remote_type;
                }
            }
        } else {
            let protocol = match opts.protocol {
                Some(protocol) => protocol,
                None => self.select_protocol(&name)?,
            };
            self.registry.add_remote(&url, &name, &remote_type, protocol)?;
        }

        self.fold(descriptors)
    }

    /// Re-sync every known remote, recording failures without stopping
    pub async fn refresh_all(&mut self, opts: &RefreshOptions) -> RefreshSummary {
        let start_time = Instant::now();

        let mut remotes: Vec<(String, String)> = self
            .registry
            .list_remotes()
            .into_iter()
            .map(|remote| (remote.name.clone(), remote.url.clone()))
            .collect();
        remotes.sort();

        let remote_opts = RemoteOptions {
            remote_type: None,
            protocol: opts.protocol,
            all_repos: opts.all_repos,
            token: None,
        };

        let mut summary = RefreshSummary::default();
        for (name, url) in remotes {
            info!("Refreshing {}", name);
            match self.add_remote(&url, &remote_opts).await {
                Ok(added) => {
                    info!("Refreshed {}: {} new repositories", name, added);
                    summary.refreshed.push((name, added));
                }
                Err(e) => {
                    error!("Failed to refresh {}: {}", name, e);
                    summary.failed.push((name, e.to_string()));
                }
            }
        }

        summary.duration = start_time.elapsed();
        summary
    }

    async fn fetch(
        &mut self,
        name: &str,
        url: &str,
        remote_type: &str,
        all_repos: bool,
    ) -> Result<Vec<RepoDescriptor>, SyncError> {
        let mut driver = self.drivers.new_driver(
            remote_type,
            DriverOpts {
                all_repos,
                auth: None,
                timeout: self.timeout,
                per_page: self.per_page,
            },
        )?;
        driver.set_host(url);

        let mut state = AuthState::Unauthenticated;
        let mut reprompted = false;

        loop {
            state = match state {
                AuthState::Unauthenticated => {
                    let auth = match driver.auth_type() {
                        AuthType::Token => self.token_auth(name)?,
                    };
                    driver.authenticate(auth);
                    AuthState::Fetching
                }
                AuthState::Fetching => match driver.get_repos().await {
                    Ok(repos) => AuthState::Done(repos),
                    Err(DriverError::Auth) => AuthState::AuthExpired,
                    Err(e) => return Err(e.into()),
                },
                AuthState::AuthExpired => {
                    warn!("Authentication rejected by {}", name);
                    self.credentials.delete(name)?;
                    if reprompted {
                        return Err(SyncError::AuthRejected(name.to_string()));
                    }
                    reprompted = true;
                    AuthState::Unauthenticated
                }
                AuthState::Done(repos) => return Ok(repos),
            };
        }
    }

    fn token_auth(&mut self, name: &str) -> Result<Auth, SyncError> {
        match self.credentials.get(name) {
            Ok(cred) => Ok(Auth::from(&cred)),
            Err(CredentialError::NotFound(_)) => {
                let token = self
                    .prompter
                    .token(name)
                    .map_err(|e| SyncError::Input(e.to_string()))?;
                self.credentials.put(name, Credential::token(&token))?;
                Ok(Auth::token(token))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn select_driver(&self, name: &str) -> Result<String, SyncError> {
        let names = self.drivers.names();
        let index = self
            .prompter
            .select(&format!("Remote type for {}", name), &names)
            .map_err(|e| SyncError::Input(e.to_string()))?;

        names
            .get(index)
            .cloned()
            .ok_or_else(|| SyncError::Input(format!("no remote type at index {}", index)))
    }

    fn select_protocol(&self, name: &str) -> Result<Protocol, SyncError> {
        let options: Vec<String> = Protocol::ALL.iter().map(|p| p.to_string()).collect();
        let index = self
            .prompter
            .select(&format!("Clone protocol for {}", name), &options)
            .map_err(|e| SyncError::Input(e.to_string()))?;

        Protocol::ALL
            .get(index)
            .copied()
            .ok_or_else(|| SyncError::Input(format!("no protocol at index {}", index)))
    }

    fn fold(&mut self, descriptors: Vec<RepoDescriptor>) -> Result<usize, SyncError> {
        let mut added = 0;

        for descriptor in descriptors {
            let repo = Repository {
                path: self.repo_root.join(&descriptor.name),
                name: descriptor.name,
                clone_url: descriptor.clone_url,
                ssh_url: descriptor.ssh_url,
            };

            match self.registry.add_repository(repo) {
                Ok(()) => added += 1,
                Err(RegistryError::RepoAlreadyExists(name)) => {
                    debug!("Already tracking {}", name);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(added)
    }
}
