//! cache::fingerprint
//!
//! Repository fingerprints used as cache keys.
//!
//! # Algorithm
//!
//! ```text
//! sha256("0" ++ repr(marker(r1)) ++ repr(marker(r2)) ++ ... ++ "|" ++ branch)
//! ```
//!
//! Repositories are visited in registry order. The filtered fingerprint
//! leaves out package repositories (`.tbz2`, `.etp`); the all-repositories
//! fingerprint does not.
//!
//! # Failure Policy
//!
//! Computing a fingerprint never fails. A repository that cannot be opened
//! is skipped quietly. A repository whose marker cannot be read is skipped
//! with an operator warning. Both end up in the report's `skipped` list.
//!
//! # Cached Summary
//!
//! [`RepositoryFingerprinter::available_repositories`] keeps the summary of
//! the filtered repository set in the [`CacheStore`] under
//! [`RepositoryFingerprinter::available_packages_key`]. A marker change
//! moves the key, so the old entry is simply never read again.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::store::CacheStore;
use crate::core::types::{CacheNamespace, Fingerprint, RepositoryId};
use crate::repository::{RepositoryError, RepositoryRegistry};
use crate::ui::output::{self, Verbosity};

/// Why a repository did not contribute to a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The repository could not be opened.
    Unavailable,
    /// The repository opened but its marker could not be read.
    Corrupted,
}

/// A repository left out of a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRepository {
    pub id: RepositoryId,
    pub reason: SkipReason,
}

/// Result of one fingerprint computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintReport {
    /// The digest.
    pub fingerprint: Fingerprint,
    /// Repositories whose marker was hashed, in hash order.
    pub included: Vec<RepositoryId>,
    /// Repositories that were skipped.
    pub skipped: Vec<SkippedRepository>,
    /// Branch tag appended to the hash input.
    pub branch: String,
}

/// Summary of the filtered repository set, as stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableRepositories {
    pub branch: String,
    pub repositories: Vec<String>,
    pub skipped: Vec<String>,
    /// Whether this came out of the cache.
    #[serde(skip)]
    pub cached: bool,
}

/// Computes repository fingerprints.
pub struct RepositoryFingerprinter {
    registry: Arc<dyn RepositoryRegistry>,
    verbosity: Verbosity,
}

impl RepositoryFingerprinter {
    /// Fingerprinter over a registry.
    pub fn new(registry: Arc<dyn RepositoryRegistry>, verbosity: Verbosity) -> Self {
        Self {
            registry,
            verbosity,
        }
    }

    /// Enabled repositories without package repositories, in registry order.
    pub fn filtered_repositories(&self) -> Vec<RepositoryId> {
        self.registry
            .enabled_repository_ids()
            .into_iter()
            .filter(|id| !id.is_package_repository())
            .collect()
    }

    /// Fingerprint of the enabled non-package repositories.
    pub fn filtered_fingerprint(&self) -> Fingerprint {
        self.filtered_report().fingerprint
    }

    /// Fingerprint of every enabled repository.
    pub fn all_fingerprint(&self) -> Fingerprint {
        self.all_report().fingerprint
    }

    /// Detailed filtered computation.
    pub fn filtered_report(&self) -> FingerprintReport {
        self.compute(&self.filtered_repositories())
    }

    /// Detailed all-repositories computation.
    pub fn all_report(&self) -> FingerprintReport {
        self.compute(&self.registry.enabled_repository_ids())
    }

    /// Cache key of the available-packages namespace.
    ///
    /// Covers the filtered fingerprint, the filtered identifier list and the
    /// branch, so editing the branch by hand invalidates the cache even when
    /// no marker changed.
    pub fn available_packages_key(&self) -> Fingerprint {
        let report = self.filtered_report();
        let ids = self
            .filtered_repositories()
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>()
            .join(",");

        let mut hasher = Sha256::new();
        hasher.update(report.fingerprint.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(ids.as_bytes());
        hasher.update(b"|");
        hasher.update(report.branch.as_bytes());
        Fingerprint::from_hasher(hasher)
    }

    /// Summary of the filtered repositories, read from `cache` when an entry
    /// for the current [`available_packages_key`](Self::available_packages_key)
    /// exists and pushed to it otherwise.
    pub fn available_repositories(&self, cache: &CacheStore) -> AvailableRepositories {
        let namespace = CacheNamespace::available_packages();
        let key = self.available_packages_key();
        if let Some(mut hit) = cache.pop::<AvailableRepositories>(&namespace, &key) {
            hit.cached = true;
            return hit;
        }

        let report = self.filtered_report();
        let summary = AvailableRepositories {
            branch: report.branch,
            repositories: report.included.iter().map(|id| id.to_string()).collect(),
            skipped: report.skipped.iter().map(|s| s.id.to_string()).collect(),
            cached: false,
        };
        if let Err(e) = cache.push(&namespace, &key, &summary) {
            tracing::warn!(%key, error = %e, "cannot cache repository summary");
        }
        summary
    }

    fn compute(&self, repositories: &[RepositoryId]) -> FingerprintReport {
        let mut hasher = Sha256::new();
        hasher.update(b"0");

        let mut included = Vec::with_capacity(repositories.len());
        let mut skipped = Vec::new();

        for id in repositories {
            let handle = match self.registry.open(id) {
                Ok(handle) => handle,
                Err(e) => {
                    tracing::debug!(repository = %id, error = %e, "skipping repository");
                    skipped.push(SkippedRepository {
                        id: id.clone(),
                        reason: SkipReason::Unavailable,
                    });
                    continue;
                }
            };

            match handle.modification_marker() {
                Ok(marker) => {
                    hasher.update(marker.repr().as_bytes());
                    included.push(id.clone());
                }
                Err(e) => {
                    let reason = match e {
                        RepositoryError::Unavailable(_) => SkipReason::Unavailable,
                        RepositoryError::Corrupted { .. } => SkipReason::Corrupted,
                    };
                    if reason == SkipReason::Corrupted {
                        let message =
                            format!("Repository {id} is corrupted. Cannot calculate the checksum");
                        tracing::warn!(repository = %id, error = %e, "{message}");
                        output::warn(&message, self.verbosity);
                    } else {
                        tracing::debug!(repository = %id, error = %e, "skipping repository");
                    }
                    skipped.push(SkippedRepository {
                        id: id.clone(),
                        reason,
                    });
                }
            }
        }

        let branch = self.registry.branch();
        hasher.update(b"|");
        hasher.update(branch.as_bytes());

        FingerprintReport {
            fingerprint: Fingerprint::from_hasher(hasher),
            included,
            skipped,
            branch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ModificationMarker;
    use crate::repository::mock::{MockRegistry, MockRepositoryState};

    fn fingerprinter(registry: &MockRegistry) -> RepositoryFingerprinter {
        RepositoryFingerprinter::new(Arc::new(registry.clone()), Verbosity::Quiet)
    }

    fn registry() -> MockRegistry {
        MockRegistry::new("stable")
            .with_repository("main", ModificationMarker::Revision(1))
            .with_repository("community", ModificationMarker::Revision(2))
    }

    #[test]
    fn stable_across_calls() {
        let reg = registry();
        let fp = fingerprinter(&reg);
        assert_eq!(fp.filtered_fingerprint(), fp.filtered_fingerprint());
        assert_eq!(fp.all_fingerprint(), fp.all_fingerprint());
    }

    #[test]
    fn matches_documented_algorithm() {
        let reg = registry();
        let expected = Fingerprint::of(&[b"0", b"r1", b"r2", b"|", b"stable"]);
        assert_eq!(fingerprinter(&reg).filtered_fingerprint(), expected);
    }

    #[test]
    fn empty_registry_hashes_seed_and_branch() {
        let reg = MockRegistry::new("stable");
        let expected = Fingerprint::of(&[b"0", b"|", b"stable"]);
        assert_eq!(fingerprinter(&reg).filtered_fingerprint(), expected);
    }

    #[test]
    fn marker_change_changes_fingerprint() {
        let reg = registry();
        let fp = fingerprinter(&reg);
        let before = fp.filtered_fingerprint();
        reg.set_marker("community", ModificationMarker::Revision(3));
        assert_ne!(before, fp.filtered_fingerprint());
    }

    #[test]
    fn branch_change_changes_fingerprint() {
        let reg = registry();
        let fp = fingerprinter(&reg);
        let before = fp.filtered_fingerprint();
        reg.set_branch("testing");
        assert_ne!(before, fp.filtered_fingerprint());
    }

    #[test]
    fn package_repositories_only_affect_all() {
        let reg = registry();
        let fp = fingerprinter(&reg);
        let filtered = fp.filtered_fingerprint();
        let all = fp.all_fingerprint();

        reg.set_marker("local.tbz2", ModificationMarker::Revision(9));
        reg.set_marker("web.etp", ModificationMarker::Revision(9));

        assert_eq!(fp.filtered_fingerprint(), filtered);
        assert_ne!(fp.all_fingerprint(), all);
    }

    #[test]
    fn unavailable_repository_is_skipped() {
        let reg = registry();
        reg.set_state("broken", MockRepositoryState::Unavailable);
        let report = fingerprinter(&reg).filtered_report();

        assert_eq!(report.included.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].reason, SkipReason::Unavailable);
        assert_eq!(report.fingerprint, fingerprinter(&registry()).filtered_fingerprint());
    }

    #[test]
    fn corrupted_repository_is_skipped() {
        let reg = registry();
        reg.set_state("main", MockRepositoryState::Corrupted);
        let report = fingerprinter(&reg).filtered_report();

        assert_eq!(report.included, vec![RepositoryId::new("community").unwrap()]);
        assert_eq!(report.skipped[0].id.as_str(), "main");
        assert_eq!(report.skipped[0].reason, SkipReason::Corrupted);
        assert_eq!(
            report.fingerprint,
            Fingerprint::of(&[b"0", b"r2", b"|", b"stable"])
        );
    }

    #[test]
    fn available_packages_key_tracks_membership() {
        let reg = registry();
        let fp = fingerprinter(&reg);
        let before = fp.available_packages_key();
        assert_eq!(before, fp.available_packages_key());

        reg.set_state("extra", MockRepositoryState::Unavailable);
        assert_eq!(fp.filtered_fingerprint(), fingerprinter(&registry()).filtered_fingerprint());
        assert_ne!(fp.available_packages_key(), before);
    }

    #[test]
    fn available_repositories_hit_until_marker_changes() {
        let temp = tempfile::TempDir::new().unwrap();
        let paths = crate::core::paths::ClientPaths::new(
            temp.path().join("run"),
            temp.path().join("cache"),
            temp.path().join("db"),
        );
        let cache = CacheStore::new(paths.clone(), None);
        let reg = registry();
        let fp = fingerprinter(&reg);

        let first = fp.available_repositories(&cache);
        assert!(!first.cached);
        assert_eq!(first.repositories, vec!["main", "community"]);
        assert!(fp.available_repositories(&cache).cached);
        assert_eq!(cache.sync(), 1);

        let old_key = fp.available_packages_key();
        reg.set_marker("main", ModificationMarker::Revision(7));
        assert_ne!(fp.available_packages_key(), old_key);
        assert!(!fp.available_repositories(&cache).cached);

        let namespace = CacheNamespace::available_packages();
        assert!(paths.cache_entry_path(&namespace, &old_key).is_file());
    }
}
