//! core::paths
//!
//! Centralized path routing for pkgfront storage locations.
//!
//! **Hard rule:** no code outside this module joins lock or cache file
//! names onto configured directories. All paths go through
//! [`ClientPaths`].
//!
//! # Storage Layout
//!
//! - `<lock_dir>/resources.lock` - Shared/exclusive resource lock
//! - `<cache_dir>/<namespace>/<fingerprint>.json` - Cached derived data
//! - `<database_dir>/<repository>/packages.db` - Repository databases
//!
//! # Example
//!
//! ```
//! use pkgfront::core::paths::ClientPaths;
//! use std::path::PathBuf;
//!
//! let paths = ClientPaths::new(
//!     PathBuf::from("/run/pkgfront"),
//!     PathBuf::from("/var/cache/pkgfront"),
//!     PathBuf::from("/var/lib/pkgfront/repositories"),
//! );
//!
//! assert_eq!(
//!     paths.resources_lock_path(),
//!     PathBuf::from("/run/pkgfront/resources.lock")
//! );
//! ```

use std::path::{Path, PathBuf};

use crate::core::config::Config;
use crate::core::types::{CacheNamespace, Fingerprint, RepositoryId};

/// Name of the pseudo-repository holding installed packages.
pub const INSTALLED_REPOSITORY_DIR: &str = "installed";

/// Database file inside each repository directory.
pub const REPOSITORY_DATABASE_FILE: &str = "packages.db";

/// Centralized path routing for pkgfront storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientPaths {
    /// Directory holding lock files.
    pub lock_dir: PathBuf,
    /// Cache root directory.
    pub cache_dir: PathBuf,
    /// Directory holding repository databases.
    pub database_dir: PathBuf,
}

impl ClientPaths {
    /// Create ClientPaths from explicit directories.
    pub fn new(lock_dir: PathBuf, cache_dir: PathBuf, database_dir: PathBuf) -> Self {
        Self {
            lock_dir,
            cache_dir,
            database_dir,
        }
    }

    /// Create ClientPaths from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.lock_dir(), config.cache_dir(), config.database_dir())
    }

    // =========================================================================
    // Locks
    // =========================================================================

    /// Path to the shared/exclusive resource lock.
    pub fn resources_lock_path(&self) -> PathBuf {
        self.lock_dir.join("resources.lock")
    }

    // =========================================================================
    // Cache
    // =========================================================================

    /// Directory of one cache namespace.
    pub fn cache_namespace_dir(&self, namespace: &CacheNamespace) -> PathBuf {
        self.cache_dir.join(namespace.as_str())
    }

    /// File holding one cache entry.
    pub fn cache_entry_path(&self, namespace: &CacheNamespace, fingerprint: &Fingerprint) -> PathBuf {
        self.cache_namespace_dir(namespace)
            .join(format!("{}.json", fingerprint.as_str()))
    }

    // =========================================================================
    // Repositories
    // =========================================================================

    /// Directory of one repository.
    pub fn repository_dir(&self, id: &RepositoryId) -> PathBuf {
        self.database_dir.join(id.as_str())
    }

    /// Database file of one repository.
    pub fn repository_database_path(&self, id: &RepositoryId) -> PathBuf {
        self.repository_dir(id).join(REPOSITORY_DATABASE_FILE)
    }

    /// Database file of the installed-packages pseudo-repository.
    pub fn installed_database_path(&self) -> PathBuf {
        self.database_dir
            .join(INSTALLED_REPOSITORY_DIR)
            .join(REPOSITORY_DATABASE_FILE)
    }

    /// Cache root as a path slice.
    pub fn cache_root(&self) -> &Path {
        &self.cache_dir
    }
}
