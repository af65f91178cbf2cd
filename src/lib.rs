//! hermes - jump to, or clone, source repositories by short name
//!
//! hermes keeps a local registry of remotes (github.com, gitlab.com, self-hosted
//! instances) and the repositories discovered under them, so a repository can
//! be found by any fragment of its name and cloned on first use.
//!
//! ## Core Features
//!
//! - **Registry**: a versioned JSON document of remotes and repositories
//! - **Remote Drivers**: paginated, token-authenticated listing of GitHub and GitLab
//! - **Sync**: auth-retry state machine folding remote listings into the registry
//! - **Configuration Management**: YAML-based configuration with XDG compliance
//!
//! ## Modules
//!
//! - [`registry`]: Remotes, repositories and the persisted document
//! - [`store`]: Seekable byte streams backing the registry and credentials
//! - [`remote`]: Driver trait, driver registry and the built-in drivers
//! - [`sync`]: Remote sync orchestration
//! - [`credentials`]: Credential storage keyed by remote name
//! - [`config`]: Configuration management and parsing

pub mod config;
pub mod credentials;
pub mod error;
pub mod git;
pub mod prompt;
pub mod registry;
pub mod remote;
pub mod store;
pub mod sync;
pub mod workspace;

pub use config::Config;
pub use credentials::{Credential, CredentialStorer, FileCredentials, MemCredentials};
pub use error::{CredentialError, DriverError, RegistryError, SyncError};
pub use git::{CloneOptions, CloneOutcome, Cloner, GitCloner};
pub use prompt::{Prompter, TerminalPrompter};
pub use registry::{Protocol, Registry, Remote, Repository};
pub use remote::{Auth, AuthType, Driver, DriverOpts, DriverRegistry, RepoDescriptor};
pub use store::Storer;
pub use sync::{RefreshOptions, RefreshSummary, RemoteOptions, RemoteSync};
