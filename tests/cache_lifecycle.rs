//! Cache entries keyed by repository fingerprints, against real database
//! files.
//!
//! Entries are never deleted when repositories change. The key moves and
//! the old entry is simply never read again.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use pkgfront::cache::{AvailableRepositories, CacheStore, RepositoryFingerprinter};
use pkgfront::core::paths::ClientPaths;
use pkgfront::core::types::{CacheNamespace, RepositoryId};
use pkgfront::repository::{DirectoryRegistry, RepositoryRegistry};
use pkgfront::ui::output::Verbosity;

// =============================================================================
// Test Fixtures
// =============================================================================

struct Layout {
    _dir: TempDir,
    paths: ClientPaths,
    fingerprinter: RepositoryFingerprinter,
    cache: CacheStore,
}

impl Layout {
    fn new(repositories: &[&str]) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let paths = ClientPaths::new(
            dir.path().join("run"),
            dir.path().join("cache"),
            dir.path().join("db"),
        );
        let ids: Vec<RepositoryId> = repositories
            .iter()
            .map(|name| RepositoryId::new(*name).unwrap())
            .collect();
        for id in &ids {
            let db = paths.repository_database_path(id);
            fs::create_dir_all(db.parent().unwrap()).unwrap();
            fs::write(&db, id.as_str()).unwrap();
        }

        let registry: Arc<dyn RepositoryRegistry> =
            Arc::new(DirectoryRegistry::new(paths.clone(), ids, "stable"));
        Self {
            fingerprinter: RepositoryFingerprinter::new(registry, Verbosity::Quiet),
            cache: CacheStore::new(paths.clone(), None),
            paths,
            _dir: dir,
        }
    }

    /// Rewrite a database as another process would, moving its mtime.
    fn touch(&self, repository: &str, ahead: Duration) {
        let db = self
            .paths
            .repository_database_path(&RepositoryId::new(repository).unwrap());
        set_mtime(&db, SystemTime::now() + ahead);
    }
}

fn set_mtime(path: &Path, time: SystemTime) {
    fs::File::options()
        .write(true)
        .open(path)
        .expect("open database")
        .set_modified(time)
        .expect("set mtime");
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn stale_entry_is_never_hit_after_database_rewrite() {
    let layout = Layout::new(&["main", "community"]);
    let namespace = CacheNamespace::available_packages();

    let old_key = layout.fingerprinter.available_packages_key();
    layout
        .cache
        .push(&namespace, &old_key, &vec!["app-editors/vim"])
        .unwrap();
    assert_eq!(layout.cache.sync(), 1);

    layout.touch("community", Duration::from_secs(3600));
    let new_key = layout.fingerprinter.available_packages_key();
    assert_ne!(old_key, new_key);

    assert_eq!(layout.cache.pop::<Vec<String>>(&namespace, &new_key), None);
    assert!(layout.paths.cache_entry_path(&namespace, &old_key).is_file());
    assert_eq!(
        layout.cache.pop::<Vec<String>>(&namespace, &old_key),
        Some(vec!["app-editors/vim".to_string()])
    );
}

#[test]
fn repository_summary_is_recomputed_after_rewrite() {
    let layout = Layout::new(&["main", "community"]);

    let first: AvailableRepositories = layout.fingerprinter.available_repositories(&layout.cache);
    assert!(!first.cached);
    assert_eq!(first.repositories, vec!["main", "community"]);
    assert!(layout.fingerprinter.available_repositories(&layout.cache).cached);
    layout.cache.sync();

    layout.touch("main", Duration::from_secs(7200));
    let after = layout.fingerprinter.available_repositories(&layout.cache);
    assert!(!after.cached);
    assert_eq!(after.repositories, first.repositories);

    let entries = fs::read_dir(
        layout
            .paths
            .cache_namespace_dir(&CacheNamespace::available_packages()),
    )
    .unwrap()
    .count();
    assert_eq!(entries, 1);
    assert_eq!(layout.cache.sync(), 1);
}

#[test]
fn clear_drops_every_entry() {
    let layout = Layout::new(&["main"]);
    let registry = DirectoryRegistry::new(layout.paths.clone(), Vec::new(), "stable");

    layout.fingerprinter.available_repositories(&layout.cache);
    layout.cache.sync();
    layout.cache.clear(&registry);

    assert!(!layout.fingerprinter.available_repositories(&layout.cache).cached);
}
