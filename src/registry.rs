//! Registry of known remotes and the repositories discovered under them
//!
//! The registry is loaded once per command with [`Registry::open`], mutated
//! in memory and written back in full with [`Registry::save`]. Skipping the
//! save discards every mutation. There is no locking: two concurrent
//! invocations against the same store race and the last writer wins.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::RegistryError;
use crate::store::{self, Storer};

/// Format tag written into every document; anything else is discarded on open
pub const FORMAT_VERSION: &str = "0.0.1";

/// Preferred clone protocol for a remote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Https,
    Ssh,
    Http,
}

impl Protocol {
    pub const ALL: [Protocol; 3] = [Protocol::Https, Protocol::Ssh, Protocol::Http];

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Https => "https",
            Protocol::Ssh => "ssh",
            Protocol::Http => "http",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "https" => Ok(Protocol::Https),
            "ssh" => Ok(Protocol::Ssh),
            "http" => Ok(Protocol::Http),
            other => Err(format!(
                "invalid protocol {}, valid values are https, ssh, http",
                other
            )),
        }
    }
}

/// A repository and its location on the filesystem
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Repository {
    /// Fully-qualified name, e.g. `github.com/org/name`
    pub name: String,

    #[serde(rename = "repo_path")]
    pub path: PathBuf,

    #[serde(default)]
    pub clone_url: String,

    #[serde(default)]
    pub ssh_url: String,
}

impl Repository {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Name of the remote this repository belongs to
    pub fn remote_name(&self) -> &str {
        remote_of(&self.name)
    }
}

/// First `/`-delimited segment of a fully-qualified repository name
pub fn remote_of(name: &str) -> &str {
    name.split('/').next().unwrap_or(name)
}

/// A source host tracked in the registry
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Remote {
    pub name: String,
    pub url: String,

    #[serde(default)]
    pub protocol: Protocol,

    /// Driver type used to sync this remote (`github`, `gitlab`, ...)
    #[serde(rename = "type", default)]
    pub remote_type: String,

    #[serde(default)]
    pub meta: HashMap<String, String>,

    #[serde(default)]
    pub repos: HashMap<String, Repository>,
}

/// The persisted root document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub version: String,

    #[serde(default)]
    pub remotes: HashMap<String, Remote>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            remotes: HashMap::new(),
        }
    }
}

/// In-memory registry bound to its backing store
pub struct Registry<S: Storer> {
    storer: S,
    pub document: Document,
}

impl<S: Storer> Registry<S> {
    /// Create an empty registry over `storer` without reading it
    pub fn new(storer: S) -> Self {
        Self {
            storer,
            document: Document::default(),
        }
    }

    /// Create a registry and load its content from `storer`
    pub fn load(storer: S) -> Self {
        let mut registry = Self::new(storer);
        registry.open();
        registry
    }

    /// Load the document from the start of the store
    ///
    /// A read failure, a parse failure or a version mismatch resets the
    /// registry to an empty document at [`FORMAT_VERSION`]. The cause is
    /// logged but never returned.
    pub fn open(&mut self) {
        self.document = match store::read_all(&mut self.storer) {
            Err(e) => {
                warn!("Could not read registry store, starting empty: {}", e);
                Document::default()
            }
            Ok(raw) if raw.iter().all(u8::is_ascii_whitespace) => {
                debug!("Registry store is empty");
                Document::default()
            }
            Ok(raw) => match serde_json::from_slice::<Document>(&raw) {
                Ok(doc) if doc.version == FORMAT_VERSION => doc,
                Ok(doc) => {
                    warn!(
                        "Discarding registry with format version {} (expected {})",
                        doc.version, FORMAT_VERSION
                    );
                    Document::default()
                }
                Err(e) => {
                    warn!("Registry store is not valid, starting empty: {}", e);
                    Document::default()
                }
            },
        };

        debug!("Opened registry with {} remotes", self.document.remotes.len());
    }

    /// Serialize the whole document over the store
    pub fn save(&mut self) -> Result<(), RegistryError> {
        let raw = serde_json::to_vec_pretty(&self.document)?;
        store::overwrite(&mut self.storer, &raw)?;
        debug!("Saved registry ({} bytes)", raw.len());
        Ok(())
    }

    /// Release the backing store
    pub fn close(mut self) -> Result<(), RegistryError> {
        self.storer.close()?;
        Ok(())
    }

    /// Insert a repository, creating its remote on the fly if unknown
    pub fn add_repository(&mut self, repo: Repository) -> Result<(), RegistryError> {
        let remote_name = repo.remote_name().to_string();

        let remote = self
            .document
            .remotes
            .entry(remote_name.clone())
            .or_insert_with(|| {
                debug!("Creating remote {} for {}", remote_name, repo.name);
                Remote {
                    name: remote_name.clone(),
                    url: format!("https://{}", remote_name),
                    ..Default::default()
                }
            });

        if remote.repos.contains_key(&repo.name) {
            return Err(RegistryError::RepoAlreadyExists(repo.name));
        }

        remote.repos.insert(repo.name.clone(), repo);
        Ok(())
    }

    /// Delete a repository by its fully-qualified name
    pub fn remove_repository(&mut self, name: &str) -> Result<(), RegistryError> {
        self.document
            .remotes
            .get_mut(remote_of(name))
            .and_then(|remote| remote.repos.remove(name))
            .map(|_| ())
            .ok_or_else(|| RegistryError::RepoNotFound(name.to_string()))
    }

    /// Register a remote with an empty repository map
    pub fn add_remote(
        &mut self,
        url: &str,
        name: &str,
        remote_type: &str,
        protocol: Protocol,
    ) -> Result<(), RegistryError> {
        if self.document.remotes.contains_key(name) {
            return Err(RegistryError::RemoteAlreadyExists(name.to_string()));
        }

        self.document.remotes.insert(
            name.to_string(),
            Remote {
                name: name.to_string(),
                url: url.to_string(),
                protocol,
                remote_type: remote_type.to_string(),
                ..Default::default()
            },
        );
        Ok(())
    }

    /// Case-insensitive substring search over every repository name,
    /// sorted ascending by name
    pub fn search_repositories(&self, needle: &str) -> Vec<Repository> {
        let needle = needle.to_lowercase();

        let mut results: Vec<Repository> = self
            .document
            .remotes
            .values()
            .flat_map(|remote| remote.repos.values())
            .filter(|repo| repo.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();

        results.sort_by(|a, b| a.name.cmp(&b.name));
        results
    }

    pub fn search_remote(&self, name: &str) -> Option<&Remote> {
        self.document.remotes.get(name)
    }

    pub fn remote_mut(&mut self, name: &str) -> Option<&mut Remote> {
        self.document.remotes.get_mut(name)
    }

    /// All remotes, in no particular order
    pub fn list_remotes(&self) -> Vec<&Remote> {
        self.document.remotes.values().collect()
    }
}
