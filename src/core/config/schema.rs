//! core::config::schema
//!
//! Configuration schema types.
//!
//! Both the system file and the user file share one schema; the user file
//! overrides the system file field by field.
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., repository identifiers must be valid).

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::RepositoryId;

/// Client configuration file.
///
/// # Example
///
/// ```toml
/// group = "pkgfront"
///
/// [repositories]
/// branch = "stable"
/// order = ["main", "community"]
/// database_dir = "/var/lib/pkgfront/repositories"
///
/// [cache]
/// directory = "/var/cache/pkgfront"
///
/// [daemon]
/// socket = "/run/pkgfront/daemon.sock"
/// connect_timeout_ms = 2000
/// query_timeout_ms = 10000
///
/// [lock]
/// directory = "/run/pkgfront"
/// timeout_ms = 10000
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Group whose members may drive the package manager
    pub group: Option<String>,

    /// Repository registry settings
    pub repositories: Option<RepositoriesConfig>,

    /// Cache store settings
    pub cache: Option<CacheConfig>,

    /// Daemon connection settings
    pub daemon: Option<DaemonConfig>,

    /// Resource lock settings
    pub lock: Option<LockConfig>,
}

impl ClientConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(group) = &self.group {
            if group.trim().is_empty() {
                return Err(ConfigError::InvalidValue("group cannot be empty".to_string()));
            }
        }

        if let Some(repos) = &self.repositories {
            repos.validate()?;
        }

        if let Some(daemon) = &self.daemon {
            if daemon.connect_timeout_ms == Some(0) {
                return Err(ConfigError::InvalidValue(
                    "daemon.connect_timeout_ms must be positive".to_string(),
                ));
            }
            if daemon.query_timeout_ms == Some(0) {
                return Err(ConfigError::InvalidValue(
                    "daemon.query_timeout_ms must be positive".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Repository registry configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoriesConfig {
    /// Active branch (channel) tag
    pub branch: Option<String>,

    /// Enabled repositories, in priority order
    pub order: Option<Vec<RepositoryId>>,

    /// Directory holding one sub-directory per repository database
    pub database_dir: Option<PathBuf>,
}

impl RepositoriesConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(branch) = &self.branch {
            if branch.is_empty() || branch.contains(char::is_whitespace) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid branch '{}'",
                    branch
                )));
            }
        }

        if let Some(order) = &self.order {
            let mut seen = HashSet::new();
            for id in order {
                if !seen.insert(id) {
                    return Err(ConfigError::InvalidValue(format!(
                        "repository '{}' listed twice",
                        id
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Cache store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Cache root directory
    pub directory: Option<PathBuf>,
}

/// Daemon connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Unix socket the daemon listens on
    pub socket: Option<PathBuf>,

    /// Connect timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Answer timeout of single-answer queries in milliseconds
    pub query_timeout_ms: Option<u64>,
}

/// Resource lock configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LockConfig {
    /// Directory holding lock files
    pub directory: Option<PathBuf>,

    /// Default wait bound for blocking acquisitions, in milliseconds
    pub timeout_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_parses() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn full_config_parses() {
        let toml = r#"
            group = "wheel"

            [repositories]
            branch = "5"
            order = ["main", "limbo"]
            database_dir = "/srv/repos"

            [cache]
            directory = "/tmp/cache"

            [daemon]
            socket = "/tmp/d.sock"
            connect_timeout_ms = 500

            [lock]
            directory = "/tmp/locks"
            timeout_ms = 100
        "#;
        let config: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.group.as_deref(), Some("wheel"));
        let repos = config.repositories.as_ref().unwrap();
        assert_eq!(repos.branch.as_deref(), Some("5"));
        assert_eq!(repos.order.as_ref().unwrap().len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_fields_rejected() {
        let result: Result<ClientConfig, _> = toml::from_str("colour = \"blue\"");
        assert!(result.is_err());
    }

    #[test]
    fn invalid_repository_id_rejected_at_parse() {
        let result: Result<ClientConfig, _> =
            toml::from_str("[repositories]\norder = [\"a/b\"]");
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_repository_rejected() {
        let config: ClientConfig =
            toml::from_str("[repositories]\norder = [\"main\", \"main\"]").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_group_rejected() {
        let config: ClientConfig = toml::from_str("group = \" \"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_connect_timeout_rejected() {
        let config: ClientConfig = toml::from_str("[daemon]\nconnect_timeout_ms = 0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_query_timeout_rejected() {
        let config: ClientConfig = toml::from_str("[daemon]\nquery_timeout_ms = 0").unwrap();
        assert!(config.validate().is_err());
    }
}
