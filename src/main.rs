use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};

use hermes::config::open_state_file;
use hermes::git::{self, CloneOutcome};
use hermes::workspace::{checkout_path, generate_alias, remove_checkout, write_target};
use hermes::{
    CloneOptions, Cloner, Config, CredentialStorer, DriverRegistry, FileCredentials, GitCloner,
    Prompter, Protocol, RefreshOptions, Registry, RegistryError, RemoteOptions, RemoteSync,
    Repository, TerminalPrompter,
};

#[derive(Parser)]
#[command(name = "hermes")]
#[command(about = "Jump to, or clone, source repositories by short name")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Repository to jump to, same as `hermes get <NAME>`
    name: Option<String>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Go to a known repository, cloning it first if needed
    Get {
        /// Full or partial repository name
        name: String,
    },

    /// Manage remotes
    Remote {
        #[command(subcommand)]
        remote_command: RemoteCommands,
    },

    /// Manage tracked repositories
    Repo {
        #[command(subcommand)]
        repo_command: RepoCommands,
    },

    /// Create the hermes state directory and default configuration
    Setup,

    /// Print the shell function that changes into the selected repository
    Alias,
}

#[derive(Subcommand)]
enum RemoteCommands {
    /// Add a remote and every repository it lists
    Add {
        /// Remote URL, e.g. github.com or https://gitlab.example:8443
        url: String,

        /// List every reachable repository, not only your own
        #[arg(short, long)]
        all: bool,

        /// Clone protocol for this remote (https, ssh, http)
        #[arg(short, long)]
        protocol: Option<Protocol>,

        /// Remote type (github, gitlab)
        #[arg(short = 't', long = "type")]
        remote_type: Option<String>,

        /// Access token to store for this remote
        #[arg(long)]
        token: Option<String>,
    },

    /// Re-list every known remote
    Refresh {
        /// List every reachable repository, not only your own
        #[arg(short, long)]
        all: bool,

        /// Replace the clone protocol of every remote
        #[arg(short, long)]
        protocol: Option<Protocol>,
    },

    /// Show known remotes
    List,
}

#[derive(Subcommand)]
enum RepoCommands {
    /// Stop tracking a repository
    Rm {
        /// Full or partial repository name
        name: String,

        /// Also delete the local checkout
        #[arg(long)]
        hard: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = init_logging(cli.verbose);
    let config = load_config(cli.config.as_deref())?;
    apply_log_level(&log_filter, cli.verbose, &config.logging.level);
    debug!("Starting hermes v{}", env!("CARGO_PKG_VERSION"));

    match (cli.command, cli.name) {
        (Some(Commands::Get { name }), _) | (None, Some(name)) => cmd_get(&name, &config).await,
        (Some(Commands::Remote { remote_command }), _) => cmd_remote(remote_command, &config).await,
        (Some(Commands::Repo { repo_command }), _) => cmd_repo(repo_command, &config),
        (Some(Commands::Setup), _) => cmd_setup(&config),
        (Some(Commands::Alias), _) => {
            print!("{}", generate_alias(&config));
            Ok(())
        }
        (None, None) => bail!("Requires a repository name or a command, see `hermes --help`"),
    }
}

type LogFilter = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

/// Initialize logging to stderr, keeping stdout for command output
fn init_logging(verbose: bool) -> LogFilter {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
    handle
}

/// Switch to the configured level unless `--verbose` or `RUST_LOG` decided it
fn apply_log_level(handle: &LogFilter, verbose: bool, level: &str) {
    if verbose || std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return;
    }
    if let Err(e) = handle.reload(EnvFilter::new(level)) {
        warn!("Failed to apply log level {}: {}", level, e);
    }
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<&std::path::Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load_or_create(path),
        None => Config::load_or_default(),
    }
}

fn open_registry(config: &Config) -> Result<Registry<File>> {
    let file = open_state_file(&config.cache_path()).context("Failed to open registry cache")?;
    Ok(Registry::load(file))
}

fn open_credentials(config: &Config) -> Result<FileCredentials<File>> {
    let file =
        open_state_file(&config.credentials_path()).context("Failed to open credentials file")?;
    Ok(FileCredentials::new(file))
}

/// Resolve a name to one repository, cloning it if needed, and record it as
/// the jump target
async fn cmd_get(name: &str, config: &Config) -> Result<()> {
    let mut registry = open_registry(config)?;
    let cloner = GitCloner::new();

    let mut matches = registry.search_repositories(name);
    let repo = match matches.len() {
        0 => {
            let repo = Repository::new(name, checkout_path(&config.repo_root(), name)?);
            let url = format!("https://{}", name);
            cloner
                .clone_repo(&repo.path, &CloneOptions { url })
                .await
                .with_context(|| format!("Error cloning repo {}", name))?;

            match registry.add_repository(repo.clone()) {
                Ok(()) | Err(RegistryError::RepoAlreadyExists(_)) => {}
                Err(e) => return Err(e).context("Error adding repo to cache"),
            }
            registry.save()?;
            repo
        }
        1 => matches.remove(0),
        _ => {
            let names: Vec<String> = matches.iter().map(|r| r.name.clone()).collect();
            let index = TerminalPrompter::new()
                .select("Multiple repositories match", &names)
                .context("Error selecting repo")?;
            if index >= matches.len() {
                bail!("Error selecting repo");
            }
            matches.swap_remove(index)
        }
    };

    if !repo.path.exists() {
        let protocol = registry
            .search_remote(repo.remote_name())
            .map(|remote| remote.protocol)
            .unwrap_or_default();
        let url = git::clone_url(&repo, protocol);

        if cloner.clone_repo(&repo.path, &CloneOptions { url }).await? == CloneOutcome::Cloned {
            info!("Cloned {}", repo.name);
        }
    }

    write_target(&config.target_path(), &repo.path).context("Error creating target file")?;
    registry.close()?;
    Ok(())
}

async fn cmd_remote(command: RemoteCommands, config: &Config) -> Result<()> {
    let mut registry = open_registry(config)?;

    match command {
        RemoteCommands::Add {
            url,
            all,
            protocol,
            remote_type,
            token,
        } => {
            let opts = RemoteOptions {
                remote_type,
                protocol,
                all_repos: all,
                token,
            };

            let mut credentials = open_credentials(config)?;
            let prompter = TerminalPrompter::new();
            let drivers = DriverRegistry::with_defaults();

            let result = RemoteSync::new(
                &mut registry,
                &mut credentials,
                &prompter,
                &drivers,
                config.repo_root(),
            )
            .timeout(config.remote_timeout())
            .per_page(config.remote.per_page)
            .add_remote(&url, &opts)
            .await;
            credentials.close()?;

            let added = result.context("Error retrieving repos")?;
            registry.save()?;
            println!("Added {} repositories from {}", added, url);
        }

        RemoteCommands::Refresh { all, protocol } => {
            let mut credentials = open_credentials(config)?;
            let prompter = TerminalPrompter::new();
            let drivers = DriverRegistry::with_defaults();

            let summary = RemoteSync::new(
                &mut registry,
                &mut credentials,
                &prompter,
                &drivers,
                config.repo_root(),
            )
            .timeout(config.remote_timeout())
            .per_page(config.remote.per_page)
            .refresh_all(&RefreshOptions {
                all_repos: all,
                protocol,
            })
            .await;
            credentials.close()?;
            registry.save()?;

            for (name, added) in &summary.refreshed {
                println!("refreshed {} ({} new)", name, added);
            }
            for (name, reason) in &summary.failed {
                println!("failed {}: {}", name, reason);
            }

            if summary.has_failures() {
                registry.close()?;
                bail!("{} remote(s) failed to refresh", summary.failed.len());
            }
        }

        RemoteCommands::List => {
            let mut remotes = registry.list_remotes();
            remotes.sort_by(|a, b| a.name.cmp(&b.name));

            for remote in remotes {
                let remote_type = if remote.remote_type.is_empty() {
                    "-"
                } else {
                    remote.remote_type.as_str()
                };
                println!(
                    "{}\t{}\t{}\t{} repos",
                    remote.name,
                    remote_type,
                    remote.protocol,
                    remote.repos.len()
                );
            }
        }
    }

    registry.close()?;
    Ok(())
}

fn cmd_repo(command: RepoCommands, config: &Config) -> Result<()> {
    let mut registry = open_registry(config)?;

    match command {
        RepoCommands::Rm { name, hard } => {
            let matches = registry.search_repositories(&name);
            let repo = match matches.iter().find(|r| r.name == name) {
                Some(exact) => exact.clone(),
                None if matches.len() == 1 => matches[0].clone(),
                None if matches.is_empty() => bail!("No repository matches {}", name),
                None => {
                    let names: Vec<&str> = matches.iter().map(|r| r.name.as_str()).collect();
                    bail!("{} matches several repositories: {}", name, names.join(", "));
                }
            };

            registry.remove_repository(&repo.name)?;
            if hard {
                remove_checkout(&repo.path, &config.repo_root())?;
            }
            registry.save()?;
            println!("Removed {}", repo.name);
        }
    }

    registry.close()?;
    Ok(())
}

fn cmd_setup(config: &Config) -> Result<()> {
    config.setup()?;
    open_state_file(&config.cache_path())?;
    open_state_file(&config.credentials_path())?;

    println!("hermes state directory: {}", config.state_dir().display());
    println!("Add `eval \"$(hermes alias)\"` to your shell profile to enable jumping");
    Ok(())
}
