//! Credential storage keyed by remote name
//!
//! The sync flow reads a credential before talking to a remote, stores a
//! freshly prompted one, and deletes it when the remote rejects it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::CredentialError;
use crate::remote::{Auth, AuthType};
use crate::store::{self, Storer};

/// A stored credential and its type
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Credential {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,

    #[serde(rename = "type")]
    pub kind: String,
}

impl Credential {
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            kind: AuthType::Token.as_str().to_string(),
            ..Default::default()
        }
    }
}

impl From<&Credential> for Auth {
    fn from(cred: &Credential) -> Self {
        Auth {
            username: cred.username.clone(),
            password: cred.password.clone(),
            token: cred.token.clone(),
        }
    }
}

/// Store and retrieve credentials by remote name
pub trait CredentialStorer {
    fn get(&mut self, key: &str) -> Result<Credential, CredentialError>;
    fn put(&mut self, key: &str, cred: Credential) -> Result<(), CredentialError>;
    fn delete(&mut self, key: &str) -> Result<(), CredentialError>;
    fn close(&mut self) -> Result<(), CredentialError>;
}

/// In-memory credential store
#[derive(Debug, Default)]
pub struct MemCredentials {
    credentials: HashMap<String, Credential>,
}

impl MemCredentials {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStorer for MemCredentials {
    fn get(&mut self, key: &str) -> Result<Credential, CredentialError> {
        self.credentials
            .get(key)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound(key.to_string()))
    }

    fn put(&mut self, key: &str, cred: Credential) -> Result<(), CredentialError> {
        self.credentials.insert(key.to_string(), cred);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), CredentialError> {
        self.credentials.remove(key);
        Ok(())
    }

    fn close(&mut self) -> Result<(), CredentialError> {
        Ok(())
    }
}

/// Credentials persisted as a YAML map in a [`Storer`]
///
/// Every call re-reads the stream and every mutation rewrites it in full.
pub struct FileCredentials<S: Storer> {
    storer: S,
}

impl<S: Storer> FileCredentials<S> {
    pub fn new(storer: S) -> Self {
        Self { storer }
    }

    fn open(&mut self) -> Result<HashMap<String, Credential>, CredentialError> {
        let raw = store::read_all(&mut self.storer)?;
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(HashMap::new());
        }

        let creds: Option<HashMap<String, Credential>> = serde_yaml::from_slice(&raw)?;
        Ok(creds.unwrap_or_default())
    }

    fn save(&mut self, creds: &HashMap<String, Credential>) -> Result<(), CredentialError> {
        let raw = serde_yaml::to_string(creds)?;
        store::overwrite(&mut self.storer, raw.as_bytes())?;
        Ok(())
    }
}

impl<S: Storer> CredentialStorer for FileCredentials<S> {
    fn get(&mut self, key: &str) -> Result<Credential, CredentialError> {
        self.open()?
            .remove(key)
            .ok_or_else(|| CredentialError::NotFound(key.to_string()))
    }

    fn put(&mut self, key: &str, cred: Credential) -> Result<(), CredentialError> {
        let mut creds = self.open()?;
        creds.insert(key.to_string(), cred);
        self.save(&creds)?;
        debug!("Stored credential for {}", key);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), CredentialError> {
        let mut creds = self.open()?;
        if creds.remove(key).is_some() {
            self.save(&creds)?;
            debug!("Deleted credential for {}", key);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), CredentialError> {
        self.storer.close()?;
        Ok(())
    }
}
