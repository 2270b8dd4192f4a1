//! Property-based tests for repository fingerprints.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated registries.

use std::sync::Arc;

use proptest::prelude::*;

use pkgfront::cache::RepositoryFingerprinter;
use pkgfront::core::types::{Fingerprint, ModificationMarker};
use pkgfront::repository::mock::{MockRegistry, MockRepositoryState};
use pkgfront::ui::output::Verbosity;

/// Strategy for generating modification markers.
fn marker() -> impl Strategy<Value = ModificationMarker> {
    prop_oneof![
        any::<u64>().prop_map(ModificationMarker::Revision),
        any::<u64>().prop_map(|n| ModificationMarker::Timestamp(u128::from(n))),
    ]
}

/// Strategy for generating a branch tag.
fn branch() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,8}"
}

/// Registry with repositories `repo0..repoN` in order.
fn registry(branch: &str, markers: &[ModificationMarker]) -> MockRegistry {
    markers
        .iter()
        .enumerate()
        .fold(MockRegistry::new(branch), |registry, (i, marker)| {
            registry.with_repository(&format!("repo{}", i), *marker)
        })
}

fn fingerprinter(registry: &MockRegistry) -> RepositoryFingerprinter {
    RepositoryFingerprinter::new(Arc::new(registry.clone()), Verbosity::Quiet)
}

fn filtered(registry: &MockRegistry) -> Fingerprint {
    fingerprinter(registry).filtered_fingerprint()
}

fn bumped(marker: ModificationMarker) -> ModificationMarker {
    match marker {
        ModificationMarker::Revision(r) => ModificationMarker::Revision(r.wrapping_add(1)),
        ModificationMarker::Timestamp(t) => ModificationMarker::Timestamp(t + 1),
    }
}

proptest! {
    /// Unchanged repositories give the same fingerprint every time.
    #[test]
    fn fingerprint_is_pure(markers in prop::collection::vec(marker(), 0..8), branch in branch()) {
        let a = registry(&branch, &markers);
        let b = registry(&branch, &markers);

        let first = filtered(&a);
        prop_assert_eq!(&first, &filtered(&a));
        prop_assert_eq!(&first, &filtered(&b));
        prop_assert_eq!(first.as_str().len(), 64);
    }

    /// Changing any one marker changes the fingerprint.
    #[test]
    fn marker_change_changes_fingerprint(
        markers in prop::collection::vec(marker(), 1..8),
        pick in any::<prop::sample::Index>(),
        branch in branch(),
    ) {
        let registry = registry(&branch, &markers);
        let before = filtered(&registry);

        let index = pick.index(markers.len());
        registry.set_marker(&format!("repo{}", index), bumped(markers[index]));
        prop_assert_ne!(before, filtered(&registry));
    }

    /// Package repositories never influence the filtered fingerprint but do
    /// influence the all-repositories fingerprint.
    #[test]
    fn package_repositories_only_affect_all(
        markers in prop::collection::vec(marker(), 0..6),
        package in marker(),
        suffix in prop_oneof![Just(".tbz2"), Just(".etp")],
        branch in branch(),
    ) {
        let base = registry(&branch, &markers);
        let with_package =
            registry(&branch, &markers).with_repository(&format!("local{}", suffix), package);

        prop_assert_eq!(filtered(&base), filtered(&with_package));
        prop_assert_ne!(
            fingerprinter(&base).all_fingerprint(),
            fingerprinter(&with_package).all_fingerprint()
        );

        let before = filtered(&with_package);
        with_package.set_marker(&format!("local{}", suffix), bumped(package));
        prop_assert_eq!(before, filtered(&with_package));
    }

    /// Broken repositories are left out without aborting the computation.
    #[test]
    fn broken_repositories_are_excluded(
        markers in prop::collection::vec(marker(), 1..6),
        broken in marker(),
        corrupted in any::<bool>(),
        branch in branch(),
    ) {
        let healthy = registry(&branch, &markers);
        let with_broken = registry(&branch, &markers).with_repository("broken", broken);
        let state = if corrupted {
            MockRepositoryState::Corrupted
        } else {
            MockRepositoryState::Unavailable
        };
        with_broken.set_state("broken", state);

        prop_assert_eq!(filtered(&healthy), filtered(&with_broken));
        let report = fingerprinter(&with_broken).filtered_report();
        prop_assert_eq!(report.skipped.len(), 1);
        prop_assert_eq!(report.included.len(), markers.len());
    }

    /// The branch is part of the hash input.
    #[test]
    fn branch_change_changes_fingerprint(
        markers in prop::collection::vec(marker(), 0..6),
        a in branch(),
        b in branch(),
    ) {
        prop_assume!(a != b);
        prop_assert_ne!(filtered(&registry(&a, &markers)), filtered(&registry(&b, &markers)));
    }
}
