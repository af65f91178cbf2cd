use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::debug;

use super::pagination::{self, RequestAuth};
use super::{Auth, AuthType, Driver, DriverOpts, RepoDescriptor};
use crate::error::DriverError;

/// Canonical API host for github.com
pub const GITHUB_API: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("hermes/", env!("CARGO_PKG_VERSION"));

/// Driver for the GitHub REST API
pub struct GitHub {
    client: Client,
    host: String,
    auth: Auth,
    all_repos: bool,
    per_page: u32,
}

/// Build a boxed GitHub driver for the driver registry
pub fn create(opts: DriverOpts) -> Result<Box<dyn Driver>, DriverError> {
    Ok(Box::new(GitHub::new(opts)?))
}

#[derive(Debug, Deserialize)]
struct GitHubRepo {
    html_url: String,
    #[serde(default)]
    clone_url: String,
    #[serde(default)]
    ssh_url: String,
}

impl From<GitHubRepo> for RepoDescriptor {
    fn from(repo: GitHubRepo) -> Self {
        RepoDescriptor::from_url(repo.html_url, repo.clone_url, repo.ssh_url)
    }
}

fn github_host_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(https?://)?(api\.)?github\.com").expect("github host pattern compiles")
    })
}

impl GitHub {
    pub fn new(opts: DriverOpts) -> Result<Self, DriverError> {
        let client = Client::builder()
            .timeout(opts.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DriverError::InvalidOpts(e.to_string()))?;

        Ok(Self {
            client,
            host: GITHUB_API.to_string(),
            auth: opts.auth.unwrap_or_default(),
            all_repos: opts.all_repos,
            per_page: opts.per_page,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn first_page_url(&self) -> String {
        let affiliation = if self.all_repos {
            "owner,collaborator,organization_member"
        } else {
            "owner"
        };

        format!(
            "{}/user/repos?per_page={}&affiliation={}",
            self.host, self.per_page, affiliation
        )
    }
}

#[async_trait]
impl Driver for GitHub {
    fn set_host(&mut self, host: &str) {
        self.host = if github_host_pattern().is_match(host) {
            GITHUB_API.to_string()
        } else {
            host.trim_end_matches('/').to_string()
        };
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
        debug!("Listing GitHub repositories from {}", self.host);

        let auth = RequestAuth::Header {
            name: "Authorization",
            value: format!("token {}", self.auth.token),
        };

        pagination::fetch_all::<GitHubRepo, _>(&self.client, url, &auth, RepoDescriptor::from).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn repos_json(owner: &str, names: &[&str]) -> Value {
        Value::Array(
            names
                .iter()
                .map(|name| {
                    json!({
                        "id": 1,
                        "name": name,
                        "html_url": format!("https://github.com/{}/{}", owner, name),
                        "clone_url": format!("https://github.com/{}/{}.git", owner, name),
                        "ssh_url": format!("git@github.com:{}/{}.git", owner, name),
                        "private": false
                    })
                })
                .collect(),
        )
    }

    fn driver_for(server: &MockServer, token: &str, all_repos: bool) -> GitHub {
        let mut driver = GitHub::new(DriverOpts {
            all_repos,
            auth: Some(Auth::token(token)),
            ..Default::default()
        })
        .unwrap();
        driver.set_host(&server.uri());
        driver
    }

    #[tokio::test]
    async fn test_get_repos_follows_next_link() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user/repos"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(repos_json("hipbot", &["f", "g"])))
            .expect(1)
            .mount(&server)
            .await;

        let next = format!(
            "<{}/user/repos?page=2>; rel=\"next\", <{}/user/repos?page=2>; rel=\"last\"",
            server.uri(),
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/user/repos"))
            .and(header("Authorization", "token abc123"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Link", next.as_str())
                    .set_body_json(repos_json("hipbot", &["a", "b", "c", "d", "e"])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let repos = driver_for(&server, "abc123", false).get_repos().await.unwrap();

        assert_eq!(repos.len(), 7);
        assert_eq!(repos[0].name, "github.com/hipbot/a");
        assert_eq!(repos[0].clone_url, "https://github.com/hipbot/a.git");
        assert_eq!(repos[0].ssh_url, "git@github.com:hipbot/a.git");
        assert_eq!(repos[6].name, "github.com/hipbot/g");
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_repos_owner_affiliation() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user/repos"))
            .and(query_param("affiliation", "owner"))
            .and(query_param("per_page", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(repos_json("me", &["mine"])))
            .expect(1)
            .mount(&server)
            .await;

        let repos = driver_for(&server, "abc", false).get_repos().await.unwrap();
        assert_eq!(repos.len(), 1);
    }

    #[tokio::test]
    async fn test_get_repos_all_affiliations() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/user/repos"))
            .and(query_param("affiliation", "owner,collaborator,organization_member"))
            .respond_with(ResponseTemplate::new(200).set_body_json(repos_json("org", &["x", "y"])))
            .expect(1)
            .mount(&server)
            .await;

        let repos = driver_for(&server, "abc", true).get_repos().await.unwrap();
        assert_eq!(repos.len(), 2);
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Bad credentials"})))
            .mount(&server)
            .await;

        let result = driver_for(&server, "expired", false).get_repos().await;
        assert_matches!(result, Err(DriverError::Auth));
    }

    #[tokio::test]
    async fn test_forbidden_is_auth_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let result = driver_for(&server, "scoped", false).get_repos().await;
        assert_matches!(result, Err(DriverError::Auth));
    }

    #[tokio::test]
    async fn test_server_error_is_request_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = driver_for(&server, "abc", false).get_repos().await;
        assert_matches!(result, Err(DriverError::RemoteRequest(_)));
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"not\": \"a list\"}"))
            .mount(&server)
            .await;

        let result = driver_for(&server, "abc", false).get_repos().await;
        assert_matches!(result, Err(DriverError::ParsingResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_request_error() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let mut driver = GitHub::new(DriverOpts {
            auth: Some(Auth::token("abc123")),
            ..Default::default()
        })
        .unwrap();
        driver.set_host(&format!("http://127.0.0.1:{}", port));

        let result = driver.get_repos().await;
        assert_matches!(result, Err(DriverError::RemoteRequest(_)));
    }

    #[tokio::test]
    async fn test_missing_token_skips_request() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let result = driver_for(&server, "", false).get_repos().await;
        assert_matches!(result, Err(DriverError::Auth));
    }

    #[test]
    fn test_set_host_normalizes_github() {
        let mut driver = GitHub::new(DriverOpts::default()).unwrap();

        for host in [
            "github.com",
            "https://github.com",
            "http://github.com/",
            "api.github.com",
            "https://api.github.com",
        ] {
            driver.set_host(host);
            assert_eq!(driver.host(), GITHUB_API, "host {}", host);
        }

        driver.set_host("https://git.corp.example/api/v3/");
        assert_eq!(driver.host(), "https://git.corp.example/api/v3");
    }

    #[test]
    fn test_auth_type_is_token() {
        let driver = GitHub::new(DriverOpts::default()).unwrap();
        assert_eq!(driver.auth_type(), AuthType::Token);
    }
}
