use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::pagination::{self, RequestAuth};
use super::{Auth, AuthType, Driver, DriverOpts, RepoDescriptor};
use crate::error::DriverError;

/// Default GitLab host
pub const GITLAB_HOST: &str = "https://gitlab.com";

const USER_AGENT: &str = concat!("hermes/", env!("CARGO_PKG_VERSION"));

/// Driver for the GitLab v4 API
pub struct GitLab {
    client: Client,
    host: String,
    auth: Auth,
    all_repos: bool,
    per_page: u32,
}

/// Build a boxed GitLab driver for the driver registry
pub fn create(opts: DriverOpts) -> Result<Box<dyn Driver>, DriverError> {
    Ok(Box::new(GitLab::new(opts)?))
}

#[derive(Debug, Deserialize)]
struct GitLabProject {
    web_url: String,
    #[serde(default)]
    http_url_to_repo: String,
    #[serde(default)]
    ssh_url_to_repo: String,
}

impl From<GitLabProject> for RepoDescriptor {
    fn from(project: GitLabProject) -> Self {
        RepoDescriptor::from_url(
            project.web_url,
            project.http_url_to_repo,
            project.ssh_url_to_repo,
        )
    }
}

impl GitLab {
    pub fn new(opts: DriverOpts) -> Result<Self, DriverError> {
        let client = Client::builder()
            .timeout(opts.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DriverError::InvalidOpts(e.to_string()))?;

        Ok(Self {
            client,
            host: GITLAB_HOST.to_string(),
            auth: opts.auth.unwrap_or_default(),
            all_repos: opts.all_repos,
            per_page: opts.per_page,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn first_page_url(&self) -> String {
        // membership=false lists every project the token can see
        format!(
            "{}/api/v4/projects?membership={}&per_page={}",
            self.host, !self.all_repos, self.per_page
        )
    }
}

#[async_trait]
impl Driver for GitLab {
    fn set_host(&mut self, host: &str) {
        let host = host.trim_end_matches('/');
        if !host.is_empty() {
            self.host = host.to_string();
        }
    }

    fn authenticate(&mut self, auth: Auth) {
        self.auth = auth;
    }

    fn auth_type(&self) -> AuthType {
        AuthType::Token
    }

    async fn get_repos(&self) -> Result<Vec<RepoDescriptor>, DriverError> {
        if self.auth.token.is_empty() {
            return Err(DriverError::Auth);
        }

        let url = self.first_page_url();
        debug!("Listing GitLab projects from {}", self.host);

        let auth = RequestAuth::Query {
            name: "private_token",
            value: self.auth.token.clone(),
        };

        pagination::fetch_all::<GitLabProject, _>(&self.client, url, &auth, RepoDescriptor::from)
            .await
    }
}
