//! cache
//!
//! Repository fingerprints and the fingerprint-keyed cache.
//!
//! # Modules
//!
//! - [`fingerprint`] - [`RepositoryFingerprinter`]
//! - [`store`] - [`CacheStore`]
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use pkgfront::cache::RepositoryFingerprinter;
//! use pkgfront::core::types::ModificationMarker;
//! use pkgfront::repository::mock::MockRegistry;
//! use pkgfront::ui::output::Verbosity;
//!
//! let registry = MockRegistry::new("stable")
//!     .with_repository("main", ModificationMarker::Revision(1));
//! let fingerprinter = RepositoryFingerprinter::new(Arc::new(registry), Verbosity::Quiet);
//!
//! assert_eq!(
//!     fingerprinter.filtered_fingerprint(),
//!     fingerprinter.filtered_fingerprint()
//! );
//! ```

pub mod fingerprint;
pub mod store;

pub use fingerprint::{
    AvailableRepositories, FingerprintReport, RepositoryFingerprinter, SkipReason, SkippedRepository,
};
pub use store::{CacheError, CacheStore};
