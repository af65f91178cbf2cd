//! Link-header pagination shared by the HTTP drivers
//!
//! Each page is requested, decoded as a JSON array and mapped into
//! descriptors. The loop ends when a response carries no `rel="next"` link;
//! page counts and totals are never consulted.

use regex::Regex;
use reqwest::header::LINK;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use tracing::debug;
use url::Url;

use super::RepoDescriptor;
use crate::error::DriverError;

/// How a driver attaches its token to each request
#[derive(Debug, Clone)]
pub(crate) enum RequestAuth {
    /// Send the token in a request header
    Header { name: &'static str, value: String },
    /// Send the token as a query parameter unless the URL already has it
    Query { name: &'static str, value: String },
}

/// Marks the last page: no `rel="next"` link was found
#[derive(Debug, PartialEq, Eq)]
struct EndOfRepos;

fn next_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"<([^>]+)>\s*;[^<]*?\brel="?next"?(?:[\s,;]|$)"#)
            .expect("next link pattern compiles")
    })
}

/// Extract the `rel="next"` URL from a `Link` header
fn next_page_url(header: Option<&str>) -> Result<String, EndOfRepos> {
    header
        .and_then(|h| next_link_pattern().captures(h))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or(EndOfRepos)
}

/// Fetch `first_url` and every following page, mapping each element
pub(crate) async fn fetch_all<T, F>(
    client: &Client,
    first_url: String,
    auth: &RequestAuth,
    mapper: F,
) -> Result<Vec<RepoDescriptor>, DriverError>
where
    T: DeserializeOwned + Send,
    F: Fn(T) -> RepoDescriptor + Send + Sync,
{
    let mut repos = Vec::new();
    let mut url = first_url;
    let mut page = 1usize;

    loop {
        let response = send(client, &url, auth).await?;

        let link = response
            .headers()
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let body = response
            .bytes()
            .await
            .map_err(|e| {
                DriverError::RemoteRequest(format!("reading page {}: {}", page, e.without_url()))
            })?;

        let items: Vec<T> = serde_json::from_slice(&body)
            .map_err(|e| DriverError::ParsingResponse(format!("page {}: {}", page, e)))?;

        debug!("Fetched page {} with {} repositories", page, items.len());
        repos.extend(items.into_iter().map(&mapper));

        match next_page_url(link.as_deref()) {
            Ok(next) => {
                url = next;
                page += 1;
            }
            Err(EndOfRepos) => break,
        }
    }

    Ok(repos)
}

/// Issue one authenticated GET and classify failures
async fn send(client: &Client, url: &str, auth: &RequestAuth) -> Result<Response, DriverError> {
    let request = match auth {
        RequestAuth::Header { name, value } => client.get(url).header(*name, value.as_str()),
        RequestAuth::Query { name, value } => {
            let mut target = Url::parse(url)
                .map_err(|e| DriverError::RemoteRequest(format!("invalid page url: {}", e)))?;
            if !target.query_pairs().any(|(key, _)| key == *name) {
                target.query_pairs_mut().append_pair(name, value);
            }
            client.get(target)
        }
    };

    let response = request
        .send()
        .await
        .map_err(|e| DriverError::RemoteRequest(e.without_url().to_string()))?;

    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(DriverError::Auth),
        status if !status.is_success() => Err(DriverError::RemoteRequest(format!(
            "{} returned {}",
            response.url().path(),
            status
        ))),
        _ => Ok(response),
    }
}
