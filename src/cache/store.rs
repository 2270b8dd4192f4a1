//! cache::store
//!
//! On-disk cache of derived data keyed by repository fingerprint.
//!
//! # Layout
//!
//! `<cache_dir>/<namespace>/<fingerprint>.json`, one JSON document per entry.
//!
//! # Design
//!
//! Writes are buffered: [`CacheStore::push`] keeps the value in memory and
//! queues it, [`CacheStore::sync`] persists the queue. Stale entries are
//! never looked up again because their fingerprint no longer matches, so
//! nothing deletes them except a full [`CacheStore::clear`].
//!
//! All state sits behind one mutex. This excludes other threads of this
//! process only; other processes sharing the directory are not excluded.

use std::collections::HashMap;
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::core::paths::ClientPaths;
use crate::core::privilege::resolve_gid;
use crate::core::types::{CacheNamespace, Fingerprint};
use crate::repository::{clear_live_caches, RepositoryRegistry};

/// Mode of the cache directory tree.
pub const CACHE_DIR_MODE: u32 = 0o775;

/// Errors from individual cache steps.
///
/// These never escape [`CacheStore::clear`]; they surface from `push`
/// and from the internal write path, where they are logged.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cannot serialize cache entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CacheError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

type EntryKey = (CacheNamespace, Fingerprint);

#[derive(Debug, Default)]
struct CacheState {
    /// Recently used decoded entries.
    memory: HashMap<EntryKey, serde_json::Value>,
    /// Entries waiting for `sync`, in push order.
    pending: Vec<(EntryKey, serde_json::Value)>,
}

/// Fingerprint-keyed cache.
#[derive(Debug)]
pub struct CacheStore {
    paths: ClientPaths,
    group: Option<String>,
    state: Mutex<CacheState>,
}

impl CacheStore {
    /// Cache rooted at `paths.cache_dir`, owned by `group` after a clear.
    pub fn new(paths: ClientPaths, group: Option<String>) -> Self {
        Self {
            paths,
            group,
            state: Mutex::new(CacheState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Root directory of the cache.
    pub fn current_directory(&self) -> &Path {
        self.paths.cache_root()
    }

    /// Queue a value for writing and remember it in memory.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Serialize`] if the value cannot be encoded.
    pub fn push<T: Serialize>(
        &self,
        namespace: &CacheNamespace,
        fingerprint: &Fingerprint,
        value: &T,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(value)?;
        let key = (namespace.clone(), fingerprint.clone());

        let mut state = self.lock();
        state.pending.retain(|(k, _)| *k != key);
        state.pending.push((key.clone(), value.clone()));
        state.memory.insert(key, value);
        Ok(())
    }

    /// Look an entry up in memory, then the pending queue, then on disk.
    ///
    /// Missing and undecodable entries are both a miss.
    pub fn pop<T: DeserializeOwned>(
        &self,
        namespace: &CacheNamespace,
        fingerprint: &Fingerprint,
    ) -> Option<T> {
        let key = (namespace.clone(), fingerprint.clone());
        let mut state = self.lock();

        let cached = state.memory.get(&key).cloned().or_else(|| {
            state
                .pending
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| value.clone())
        });
        let value = match cached {
            Some(value) => value,
            None => {
                let value = self.read_entry(namespace, fingerprint)?;
                state.memory.insert(key, value.clone());
                value
            }
        };

        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::debug!(%namespace, %fingerprint, error = %e, "undecodable cache entry");
                None
            }
        }
    }

    fn read_entry(
        &self,
        namespace: &CacheNamespace,
        fingerprint: &Fingerprint,
    ) -> Option<serde_json::Value> {
        let path = self.paths.cache_entry_path(namespace, fingerprint);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "cannot read cache entry");
                return None;
            }
        };
        match serde_json::from_slice(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "corrupt cache entry");
                None
            }
        }
    }

    /// Persist queued writes.
    ///
    /// Entries that fail to write are logged and dropped. Returns the number
    /// of entries written.
    pub fn sync(&self) -> usize {
        let pending = std::mem::take(&mut self.lock().pending);
        let mut written = 0;
        for ((namespace, fingerprint), value) in pending {
            match self.write_entry(&namespace, &fingerprint, &value) {
                Ok(()) => written += 1,
                Err(e) => tracing::warn!(%namespace, %fingerprint, error = %e, "dropping cache entry"),
            }
        }
        written
    }

    /// Drop queued writes without persisting them.
    pub fn discard(&self) {
        self.lock().pending.clear();
    }

    /// Number of queued writes.
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    fn write_entry(
        &self,
        namespace: &CacheNamespace,
        fingerprint: &Fingerprint,
        value: &serde_json::Value,
    ) -> Result<(), CacheError> {
        let dir = self.paths.cache_namespace_dir(namespace);
        fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;

        let content = serde_json::to_vec(value)?;
        let path = self.paths.cache_entry_path(namespace, fingerprint);
        let temp_path = path.with_extension("json.tmp");

        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .map_err(|e| CacheError::io(&temp_path, e))?;
            file.write_all(&content)
                .map_err(|e| CacheError::io(&temp_path, e))?;
            file.sync_all().map_err(|e| CacheError::io(&temp_path, e))?;
        }

        fs::rename(&temp_path, &path).map_err(|e| CacheError::io(&path, e))
    }

    /// Wipe the cache. Never fails.
    ///
    /// Holds the store lock for the whole sequence: queued writes and
    /// in-memory entries are dropped, the live caches of open repository
    /// handles are cleared, then the directory is removed and recreated
    /// with [`CACHE_DIR_MODE`] and the configured group. Removal errors are
    /// logged and ignored; creation and permission steps log and stop at the
    /// first failure.
    pub fn clear(&self, registry: &dyn RepositoryRegistry) {
        self.clear_with(registry, remove_tree);
    }

    fn clear_with(
        &self,
        registry: &dyn RepositoryRegistry,
        remove: impl FnOnce(&Path) -> io::Result<()>,
    ) {
        let mut state = self.lock();
        state.pending.clear();
        state.memory.clear();
        clear_live_caches(registry);

        let dir = self.current_directory();
        if let Err(e) = remove(dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "cannot fully remove cache directory");
        }
        if let Err(e) = DirBuilder::new().recursive(true).mode(CACHE_DIR_MODE).create(dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "cannot create cache directory");
            return;
        }
        if let Err(e) = self.setup_permissions(dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "cannot set cache permissions");
            return;
        }
        tracing::debug!(dir = %dir.display(), "cache cleared");
    }

    fn setup_permissions(&self, dir: &Path) -> Result<(), CacheError> {
        fs::set_permissions(dir, fs::Permissions::from_mode(CACHE_DIR_MODE))
            .map_err(|e| CacheError::io(dir, e))?;

        let Some(group) = &self.group else {
            return Ok(());
        };
        let Some(gid) = resolve_gid(group) else {
            tracing::debug!(%group, "cache group does not exist, keeping ownership");
            return Ok(());
        };
        nix::unistd::chown(dir, None, Some(gid))
            .map_err(|e| CacheError::io(dir, io::Error::from(e)))
    }
}

fn remove_tree(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ModificationMarker, RepositoryId};
    use crate::repository::mock::MockRegistry;
    use crate::repository::RepositoryRegistry;
    use tempfile::TempDir;

    fn store() -> (TempDir, CacheStore) {
        let temp = TempDir::new().unwrap();
        let paths = ClientPaths::new(
            temp.path().join("run"),
            temp.path().join("cache"),
            temp.path().join("db"),
        );
        (temp, CacheStore::new(paths, Some("pkgfront-no-such-group-xyz".into())))
    }

    fn key(n: u8) -> Fingerprint {
        Fingerprint::of(&[&[n]])
    }

    #[test]
    fn pop_miss() {
        let (_temp, store) = store();
        let ns = CacheNamespace::available_packages();
        assert_eq!(store.pop::<Vec<String>>(&ns, &key(1)), None);
    }

    #[test]
    fn push_is_visible_before_sync() {
        let (_temp, store) = store();
        let ns = CacheNamespace::available_packages();
        store.push(&ns, &key(1), &vec!["a", "b"]).unwrap();
        assert_eq!(store.pending_len(), 1);
        assert_eq!(
            store.pop::<Vec<String>>(&ns, &key(1)),
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn sync_persists_across_instances() {
        let (temp, store) = store();
        let ns = CacheNamespace::available_packages();
        store.push(&ns, &key(1), &42u32).unwrap();
        assert_eq!(store.sync(), 1);
        assert_eq!(store.pending_len(), 0);

        let path = store.paths.cache_entry_path(&ns, &key(1));
        assert!(path.is_file());

        let paths = store.paths.clone();
        drop(store);
        let reopened = CacheStore::new(paths, None);
        assert_eq!(reopened.pop::<u32>(&ns, &key(1)), Some(42));
        drop(temp);
    }

    #[test]
    fn discard_drops_pending() {
        let (_temp, store) = store();
        let ns = CacheNamespace::available_packages();
        store.push(&ns, &key(1), &1u32).unwrap();
        store.discard();
        assert_eq!(store.sync(), 0);
        assert!(!store.paths.cache_entry_path(&ns, &key(1)).exists());
    }

    #[test]
    fn undecodable_entry_is_a_miss() {
        let (_temp, store) = store();
        let ns = CacheNamespace::available_packages();
        let path = store.paths.cache_entry_path(&ns, &key(2));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"{not json").unwrap();
        assert_eq!(store.pop::<u32>(&ns, &key(2)), None);

        store.push(&ns, &key(3), &"text").unwrap();
        assert_eq!(store.pop::<u32>(&ns, &key(3)), None);
    }

    #[test]
    fn clear_leaves_empty_directory_with_mode() {
        let (_temp, store) = store();
        let ns = CacheNamespace::available_packages();
        store.push(&ns, &key(1), &1u32).unwrap();
        store.sync();
        store.push(&ns, &key(2), &2u32).unwrap();

        let registry = MockRegistry::new("stable")
            .with_repository("main", ModificationMarker::Revision(1))
            .with_installed(ModificationMarker::Revision(1));
        registry.open(&RepositoryId::new("main").unwrap()).unwrap();

        store.clear(&registry);

        let dir = store.current_directory();
        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(dir).unwrap().count(), 0);
        let mode = fs::metadata(dir).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, CACHE_DIR_MODE);
        assert_eq!(store.pending_len(), 0);
        assert_eq!(store.pop::<u32>(&ns, &key(1)), None);
        assert_eq!(registry.cache_clears(), 2);
    }

    #[test]
    fn clear_without_existing_directory() {
        let (_temp, store) = store();
        store.clear(&MockRegistry::new("stable"));
        assert!(store.current_directory().is_dir());
    }

    #[test]
    fn clear_resets_directory_after_partial_removal() {
        let (_temp, store) = store();
        let dir = store.current_directory().to_path_buf();
        let stuck = dir.join("busy").join("entry.json");
        fs::create_dir_all(stuck.parent().unwrap()).unwrap();
        fs::write(&stuck, b"{}").unwrap();
        fs::write(dir.join("stale.json"), b"{}").unwrap();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o700)).unwrap();

        store.clear_with(&MockRegistry::new("stable"), |dir| {
            fs::remove_file(dir.join("stale.json"))?;
            Err(io::Error::other("device or resource busy"))
        });

        assert!(dir.is_dir());
        assert!(stuck.exists());
        assert!(!dir.join("stale.json").exists());
        let mode = fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, CACHE_DIR_MODE);
    }

    #[test]
    fn clear_never_fails_on_unwritable_parent() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let paths = ClientPaths::new(
            temp.path().join("run"),
            blocker.join("cache"),
            temp.path().join("db"),
        );
        let store = CacheStore::new(paths, None);
        store.clear(&MockRegistry::new("stable"));
        assert!(!store.current_directory().exists());
    }
}
