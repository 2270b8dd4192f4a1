//! repository::traits
//!
//! Repository registry collaborator.
//!
//! # Design
//!
//! Repositories are owned by a registry outside the coordination core.
//! The core only reads identifiers and modification markers, and asks open
//! handles to drop their live caches. Registry operations are synchronous
//! local reads.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::core::types::{ModificationMarker, RepositoryId};

/// Errors from repository access.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    /// The repository cannot be opened (not downloaded, removed, ...).
    #[error("repository '{0}' is not available")]
    Unavailable(RepositoryId),

    /// The repository opened but its metadata cannot be read.
    #[error("repository '{id}' is corrupted: {reason}")]
    Corrupted {
        /// Repository identifier
        id: RepositoryId,
        /// What went wrong
        reason: String,
    },
}

/// An open repository.
pub trait RepositoryHandle: Send + Sync + fmt::Debug {
    /// Identifier of this repository.
    fn id(&self) -> &RepositoryId;

    /// Current modification marker.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Corrupted`] if the marker cannot be read.
    fn modification_marker(&self) -> Result<ModificationMarker, RepositoryError>;

    /// Drop in-memory caches held by this handle.
    fn clear_cache(&self);
}

/// Registry of configured repositories.
///
/// # Invariants
///
/// - [`enabled_repository_ids`](Self::enabled_repository_ids) returns the
///   same order on every call within one process run
pub trait RepositoryRegistry: Send + Sync {
    /// Enabled repositories, in registry order.
    fn enabled_repository_ids(&self) -> Vec<RepositoryId>;

    /// Active branch (channel) tag.
    fn branch(&self) -> String;

    /// Open (or reuse) a handle to a repository.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Unavailable`] if the repository cannot be opened.
    fn open(&self, id: &RepositoryId) -> Result<Arc<dyn RepositoryHandle>, RepositoryError>;

    /// Handles opened so far.
    fn open_handles(&self) -> Vec<Arc<dyn RepositoryHandle>>;

    /// The installed-packages pseudo-repository, if present.
    fn installed(&self) -> Option<Arc<dyn RepositoryHandle>>;
}

/// Clear the live cache of every open handle, installed repository included.
pub fn clear_live_caches(registry: &dyn RepositoryRegistry) {
    if let Some(installed) = registry.installed() {
        installed.clear_cache();
    }
    for handle in registry.open_handles() {
        handle.clear_cache();
    }
}
