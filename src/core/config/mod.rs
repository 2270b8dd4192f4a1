//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! pkgfront has two configuration scopes:
//! - **System**: `/etc/pkgfront/config.toml`, shared with the daemon
//! - **User**: per-user overrides
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. System config file
//! 3. User config file
//! 4. CLI flags (not handled here)
//!
//! # User Config Locations
//!
//! Searched in order:
//! 1. `$PKGFRONT_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/pkgfront/config.toml`
//! 3. the platform config directory, e.g. `~/.config/pkgfront/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use pkgfront::core::config::Config;
//!
//! let result = Config::load().unwrap();
//! let config = result.config;
//!
//! println!("Branch: {}", config.branch());
//! println!("Cache: {}", config.cache_dir().display());
//! ```

pub mod schema;

pub use schema::{CacheConfig, ClientConfig, DaemonConfig, LockConfig, RepositoriesConfig};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::types::RepositoryId;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/pkgfront/config.toml";

/// Default group allowed to drive the package manager.
pub const DEFAULT_GROUP: &str = "pkgfront";

/// Default branch tag.
pub const DEFAULT_BRANCH: &str = "stable";

const DEFAULT_DATABASE_DIR: &str = "/var/lib/pkgfront/repositories";
const DEFAULT_CACHE_DIR: &str = "/var/cache/pkgfront";
const DEFAULT_SOCKET: &str = "/run/pkgfront/daemon.sock";
const DEFAULT_LOCK_DIR: &str = "/run/pkgfront";
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_QUERY_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 10_000;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Files that were actually read, system first.
    pub sources: Vec<PathBuf>,
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence rules and defaults automatically.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// System configuration
    pub system: ClientConfig,
    /// User configuration (if any)
    pub user: Option<ClientConfig>,
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed.
    /// Missing config files are not an error (defaults are used).
    pub fn load() -> Result<ConfigLoadResult, ConfigError> {
        let user_path = Self::find_user_config();
        Self::load_from_paths(Some(Path::new(SYSTEM_CONFIG_PATH)), user_path.as_deref())
    }

    /// Load configuration from explicit paths.
    ///
    /// Paths that do not exist are skipped.
    pub fn load_from_paths(
        system_path: Option<&Path>,
        user_path: Option<&Path>,
    ) -> Result<ConfigLoadResult, ConfigError> {
        let mut sources = Vec::new();

        let system = match system_path.filter(|p| p.exists()) {
            Some(path) => {
                sources.push(path.to_path_buf());
                Self::read_config(path)?
            }
            None => ClientConfig::default(),
        };

        let user = match user_path.filter(|p| p.exists()) {
            Some(path) => {
                sources.push(path.to_path_buf());
                Some(Self::read_config(path)?)
            }
            None => None,
        };

        system.validate()?;
        if let Some(ref u) = user {
            u.validate()?;
        }

        Ok(ConfigLoadResult {
            config: Config { system, user },
            sources,
        })
    }

    /// Locate the user config file, if any.
    fn find_user_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("PKGFRONT_CONFIG") {
            return Some(PathBuf::from(path));
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("pkgfront/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::config_dir()
            .map(|dir| dir.join("pkgfront/config.toml"))
            .filter(|path| path.exists())
    }

    /// Read and parse a config file.
    fn read_config(path: &Path) -> Result<ClientConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Resolve a value, user scope first.
    fn pick<T>(&self, f: impl Fn(&ClientConfig) -> Option<T>) -> Option<T> {
        self.user.as_ref().and_then(&f).or_else(|| f(&self.system))
    }

    /// Effective configuration with every default filled in.
    pub fn effective(&self) -> ClientConfig {
        ClientConfig {
            group: Some(self.group()),
            repositories: Some(RepositoriesConfig {
                branch: Some(self.branch()),
                order: Some(self.repository_order()),
                database_dir: Some(self.database_dir()),
            }),
            cache: Some(CacheConfig {
                directory: Some(self.cache_dir()),
            }),
            daemon: Some(DaemonConfig {
                socket: Some(self.daemon_socket()),
                connect_timeout_ms: Some(self.connect_timeout().as_millis() as u64),
                query_timeout_ms: Some(self.query_timeout().as_millis() as u64),
            }),
            lock: Some(LockConfig {
                directory: Some(self.lock_dir()),
                timeout_ms: Some(self.lock_timeout().as_millis() as u64),
            }),
        }
    }

    // =========================================================================
    // Accessors with precedence
    // =========================================================================

    /// Group allowed to run the client.
    pub fn group(&self) -> String {
        self.pick(|c| c.group.clone())
            .unwrap_or_else(|| DEFAULT_GROUP.to_string())
    }

    /// Active branch tag.
    pub fn branch(&self) -> String {
        self.pick(|c| c.repositories.as_ref()?.branch.clone())
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string())
    }

    /// Explicit repository order, empty when unset.
    pub fn repository_order(&self) -> Vec<RepositoryId> {
        self.pick(|c| c.repositories.as_ref()?.order.clone())
            .unwrap_or_default()
    }

    /// Directory holding the repository databases.
    pub fn database_dir(&self) -> PathBuf {
        self.pick(|c| c.repositories.as_ref()?.database_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_DIR))
    }

    /// Cache root directory.
    pub fn cache_dir(&self) -> PathBuf {
        self.pick(|c| c.cache.as_ref()?.directory.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR))
    }

    /// Daemon socket path.
    pub fn daemon_socket(&self) -> PathBuf {
        self.pick(|c| c.daemon.as_ref()?.socket.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET))
    }

    /// Daemon connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(
            self.pick(|c| c.daemon.as_ref()?.connect_timeout_ms)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
        )
    }

    /// Answer timeout of single-answer daemon queries.
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(
            self.pick(|c| c.daemon.as_ref()?.query_timeout_ms)
                .unwrap_or(DEFAULT_QUERY_TIMEOUT_MS),
        )
    }

    /// Directory holding lock files.
    pub fn lock_dir(&self) -> PathBuf {
        self.pick(|c| c.lock.as_ref()?.directory.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCK_DIR))
    }

    /// Default wait bound for blocking lock acquisitions.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(
            self.pick(|c| c.lock.as_ref()?.timeout_ms)
                .unwrap_or(DEFAULT_LOCK_TIMEOUT_MS),
        )
    }
}
