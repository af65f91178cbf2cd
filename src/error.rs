//! Error taxonomy for the registry, the remote drivers and the sync flow
//!
//! Registry and driver errors are plain values the caller branches on.
//! Only [`DriverError::Auth`] drives recovery logic (credential eviction
//! and re-prompt) inside [`crate::sync`].

use thiserror::Error;

/// Errors returned by [`crate::registry::Registry`] mutations and saves
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("repo {0} not found")]
    RepoNotFound(String),

    #[error("repo {0} already exists")]
    RepoAlreadyExists(String),

    #[error("remote {0} already exists")]
    RemoteAlreadyExists(String),

    #[error("registry store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize registry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors returned by remote drivers and the driver registry
#[derive(Debug, Error)]
pub enum DriverError {
    /// The remote rejected the credential (HTTP 401/403) or none was set
    #[error("authentication rejected by remote")]
    Auth,

    /// Transport failure or a non-auth HTTP error status
    #[error("remote request failed: {0}")]
    RemoteRequest(String),

    #[error("failed to parse remote response: {0}")]
    ParsingResponse(String),

    #[error("driver {0} not implemented")]
    NotImplemented(String),

    #[error("invalid driver options: {0}")]
    InvalidOpts(String),
}

/// Errors returned by credential storers
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential for {0} not found")]
    NotFound(String),

    #[error("credential store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential store is malformed: {0}")]
    Format(#[from] serde_yaml::Error),
}

/// Errors surfaced while syncing one remote
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid remote url {0}")]
    InvalidRemote(String),

    #[error("error retrieving input: {0}")]
    Input(String),

    /// A second consecutive auth failure after re-prompting
    #[error("authentication for {0} failed after re-prompting")]
    AuthRejected(String),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Credential(#[from] CredentialError),
}
