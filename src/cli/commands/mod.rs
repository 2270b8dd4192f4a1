//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Loads configuration through [`Services::load`]
//! 2. Calls into the library to do the work
//! 3. Formats and displays output
//!
//! # Async Commands
//!
//! Commands talking to the daemon (`run`, `status`) are async. Their
//! handlers build a tokio runtime and block on it, so dispatch stays
//! synchronous.

mod cache;
mod completion;
mod config_cmd;
mod fingerprint;
mod lock;
mod run;
mod status;

pub use cache::clear as cache_clear;
pub use completion::completion;
pub use config_cmd::show as config_show;
pub use fingerprint::fingerprint;
pub use lock::lock;
pub use run::run;
pub use status::status;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};

use crate::cache::CacheStore;
use crate::cli::args::{CacheAction, Command};
use crate::cli::Context;
use crate::core::config::{Config, ConfigLoadResult, SYSTEM_CONFIG_PATH};
use crate::core::paths::ClientPaths;
use crate::repository::{DirectoryRegistry, RepositoryRegistry};

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Run => run::run(ctx),
        Command::Fingerprint { all, key, json } => fingerprint::fingerprint(ctx, all, key, json),
        Command::Cache { action } => match action {
            CacheAction::Clear => cache::clear(ctx),
        },
        Command::Lock { exclusive, timeout } => lock::lock(ctx, exclusive, timeout),
        Command::Status => status::status(ctx),
        Command::Config => config_cmd::show(ctx),
        Command::Completion { shell } => completion::completion(shell),
    }
}

/// Load configuration, honoring `--config`.
pub(crate) fn load_config(ctx: &Context) -> Result<ConfigLoadResult> {
    match &ctx.config {
        Some(path) => {
            if !path.exists() {
                bail!("config file '{}' does not exist", path.display());
            }
            Config::load_from_paths(Some(Path::new(SYSTEM_CONFIG_PATH)), Some(path))
                .context("Failed to load config")
        }
        None => Config::load().context("Failed to load config"),
    }
}

/// Collaborators built from configuration.
pub(crate) struct Services {
    pub config: Config,
    pub paths: ClientPaths,
    pub registry: Arc<dyn RepositoryRegistry>,
    pub cache: Arc<CacheStore>,
}

impl Services {
    /// Load configuration and wire the registry and cache.
    pub fn load(ctx: &Context) -> Result<Self> {
        let loaded = load_config(ctx)?;
        for source in &loaded.sources {
            tracing::debug!(path = %source.display(), "loaded config");
        }

        let config = loaded.config;
        let paths = ClientPaths::from_config(&config);
        let registry: Arc<dyn RepositoryRegistry> = Arc::new(DirectoryRegistry::new(
            paths.clone(),
            config.repository_order(),
            config.branch(),
        ));
        let cache = Arc::new(CacheStore::new(paths.clone(), Some(config.group())));

        Ok(Self {
            config,
            paths,
            registry,
            cache,
        })
    }
}
