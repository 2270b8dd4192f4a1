//! repository::directory
//!
//! Registry backed by a directory of repository databases.
//!
//! # Storage
//!
//! - `<database_dir>/<repository>/packages.db` - one database per repository
//! - `<database_dir>/installed/packages.db` - installed packages
//!
//! The modification marker of a repository is the mtime of its database
//! file, read from disk on every call so that rewrites by other processes
//! show up in the next fingerprint. Handles keep no live cache of their own,
//! so [`RepositoryHandle::clear_cache`] has nothing to drop.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::traits::{RepositoryError, RepositoryHandle, RepositoryRegistry};
use crate::core::paths::{ClientPaths, INSTALLED_REPOSITORY_DIR};
use crate::core::types::{ModificationMarker, RepositoryId};

/// An open repository database on disk.
#[derive(Debug)]
pub struct DirectoryRepository {
    id: RepositoryId,
    database: PathBuf,
}

impl DirectoryRepository {
    fn new(id: RepositoryId, database: PathBuf) -> Self {
        Self { id, database }
    }
}

impl RepositoryHandle for DirectoryRepository {
    fn id(&self) -> &RepositoryId {
        &self.id
    }

    fn modification_marker(&self) -> Result<ModificationMarker, RepositoryError> {
        let modified = fs::metadata(&self.database)
            .and_then(|meta| meta.modified())
            .map_err(|e| RepositoryError::Corrupted {
                id: self.id.clone(),
                reason: format!("cannot stat {}: {}", self.database.display(), e),
            })?;

        Ok(ModificationMarker::from_system_time(modified))
    }

    fn clear_cache(&self) {}
}

/// Registry over `<database_dir>`.
#[derive(Debug)]
pub struct DirectoryRegistry {
    paths: ClientPaths,
    enabled: Vec<RepositoryId>,
    branch: String,
    handles: Mutex<HashMap<RepositoryId, Arc<DirectoryRepository>>>,
    installed: Mutex<Option<Arc<DirectoryRepository>>>,
}

impl DirectoryRegistry {
    /// Registry with an explicit repository order.
    ///
    /// When `order` is empty the database directory is listed once and its
    /// repositories are enabled in name order.
    pub fn new(paths: ClientPaths, order: Vec<RepositoryId>, branch: impl Into<String>) -> Self {
        let enabled = if order.is_empty() {
            Self::discover(&paths)
        } else {
            order
        };

        Self {
            paths,
            enabled,
            branch: branch.into(),
            handles: Mutex::new(HashMap::new()),
            installed: Mutex::new(None),
        }
    }

    fn discover(paths: &ClientPaths) -> Vec<RepositoryId> {
        let Ok(entries) = fs::read_dir(&paths.database_dir) else {
            tracing::debug!(dir = %paths.database_dir.display(), "no repository directory");
            return Vec::new();
        };

        let mut ids: Vec<RepositoryId> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name != INSTALLED_REPOSITORY_DIR)
            .filter_map(|name| RepositoryId::new(name).ok())
            .collect();
        ids.sort();
        ids
    }
}

impl RepositoryRegistry for DirectoryRegistry {
    fn enabled_repository_ids(&self) -> Vec<RepositoryId> {
        self.enabled.clone()
    }

    fn branch(&self) -> String {
        self.branch.clone()
    }

    fn open(&self, id: &RepositoryId) -> Result<Arc<dyn RepositoryHandle>, RepositoryError> {
        let mut handles = self
            .handles
            .lock()
            .map_err(|_| RepositoryError::Unavailable(id.clone()))?;

        if let Some(handle) = handles.get(id) {
            return Ok(Arc::clone(handle) as Arc<dyn RepositoryHandle>);
        }

        let database = self.paths.repository_database_path(id);
        if !database.is_file() {
            return Err(RepositoryError::Unavailable(id.clone()));
        }

        let handle = Arc::new(DirectoryRepository::new(id.clone(), database));
        handles.insert(id.clone(), Arc::clone(&handle));
        Ok(handle)
    }

    fn open_handles(&self) -> Vec<Arc<dyn RepositoryHandle>> {
        match self.handles.lock() {
            Ok(handles) => handles
                .values()
                .map(|h| Arc::clone(h) as Arc<dyn RepositoryHandle>)
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn installed(&self) -> Option<Arc<dyn RepositoryHandle>> {
        let mut installed = self.installed.lock().ok()?;
        if installed.is_none() {
            let database = self.paths.installed_database_path();
            if !database.is_file() {
                return None;
            }
            let id = RepositoryId::new(INSTALLED_REPOSITORY_DIR).ok()?;
            *installed = Some(Arc::new(DirectoryRepository::new(id, database)));
        }
        installed
            .as_ref()
            .map(|h| Arc::clone(h) as Arc<dyn RepositoryHandle>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(repos: &[&str]) -> (TempDir, ClientPaths) {
        let temp = TempDir::new().unwrap();
        let paths = ClientPaths::new(
            temp.path().join("run"),
            temp.path().join("cache"),
            temp.path().join("db"),
        );
        for repo in repos {
            let id = RepositoryId::new(*repo).unwrap();
            let db = paths.repository_database_path(&id);
            fs::create_dir_all(db.parent().unwrap()).unwrap();
            fs::write(&db, b"db").unwrap();
        }
        (temp, paths)
    }

    fn id(s: &str) -> RepositoryId {
        RepositoryId::new(s).unwrap()
    }

    #[test]
    fn explicit_order_is_kept() {
        let (_temp, paths) = setup(&["a", "b"]);
        let registry = DirectoryRegistry::new(paths, vec![id("b"), id("a")], "stable");
        assert_eq!(registry.enabled_repository_ids(), vec![id("b"), id("a")]);
    }

    #[test]
    fn discovery_is_sorted_and_skips_installed() {
        let (_temp, paths) = setup(&["zeta", "alpha", "installed"]);
        let registry = DirectoryRegistry::new(paths, Vec::new(), "stable");
        assert_eq!(registry.enabled_repository_ids(), vec![id("alpha"), id("zeta")]);
    }

    #[test]
    fn missing_database_is_unavailable() {
        let (_temp, paths) = setup(&["a"]);
        let registry = DirectoryRegistry::new(paths, vec![id("a"), id("gone")], "stable");
        assert!(registry.open(&id("a")).is_ok());
        assert_eq!(
            registry.open(&id("gone")).unwrap_err(),
            RepositoryError::Unavailable(id("gone"))
        );
    }

    #[test]
    fn open_reuses_handles() {
        let (_temp, paths) = setup(&["a"]);
        let registry = DirectoryRegistry::new(paths, vec![id("a")], "stable");
        registry.open(&id("a")).unwrap();
        registry.open(&id("a")).unwrap();
        assert_eq!(registry.open_handles().len(), 1);
    }

    #[test]
    fn marker_follows_database_rewrites() {
        let (_temp, paths) = setup(&["main"]);
        let db = paths.repository_database_path(&id("main"));
        let registry = Arc::new(DirectoryRegistry::new(paths, vec![id("main")], "stable"));
        let fingerprinter = crate::cache::RepositoryFingerprinter::new(
            registry.clone(),
            crate::ui::output::Verbosity::Quiet,
        );

        let before = fingerprinter.filtered_fingerprint();
        let later = std::time::SystemTime::now() + std::time::Duration::from_secs(3600);
        fs::File::options()
            .write(true)
            .open(&db)
            .unwrap()
            .set_modified(later)
            .unwrap();

        assert_ne!(before, fingerprinter.filtered_fingerprint());
        assert_eq!(registry.open_handles().len(), 1);
    }

    #[test]
    fn removed_database_is_corrupted_for_open_handle() {
        let (_temp, paths) = setup(&["a"]);
        let db = paths.repository_database_path(&id("a"));
        let registry = DirectoryRegistry::new(paths, vec![id("a")], "stable");
        let handle = registry.open(&id("a")).unwrap();

        assert!(handle.modification_marker().is_ok());
        fs::remove_file(&db).unwrap();
        assert!(matches!(
            handle.modification_marker(),
            Err(RepositoryError::Corrupted { .. })
        ));
    }

    #[test]
    fn installed_pseudo_repository() {
        let (_temp, paths) = setup(&[]);
        let registry = DirectoryRegistry::new(paths.clone(), Vec::new(), "stable");
        assert!(registry.installed().is_none());

        let db = paths.installed_database_path();
        fs::create_dir_all(db.parent().unwrap()).unwrap();
        fs::write(&db, b"db").unwrap();
        let installed = registry.installed().unwrap();
        assert_eq!(installed.id().as_str(), "installed");
    }
}
