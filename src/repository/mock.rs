//! repository::mock
//!
//! In-memory registry for deterministic testing.
//!
//! # Example
//!
//! ```
//! use pkgfront::core::types::{ModificationMarker, RepositoryId};
//! use pkgfront::repository::mock::MockRegistry;
//! use pkgfront::repository::RepositoryRegistry;
//!
//! let registry = MockRegistry::new("stable")
//!     .with_repository("main", ModificationMarker::Revision(1))
//!     .with_repository("local.tbz2", ModificationMarker::Revision(1));
//!
//! let ids = registry.enabled_repository_ids();
//! assert_eq!(ids.len(), 2);
//! assert_eq!(ids[0], RepositoryId::new("main").unwrap());
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use super::traits::{RepositoryError, RepositoryHandle, RepositoryRegistry};
use crate::core::types::{ModificationMarker, RepositoryId};

/// State of one mock repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockRepositoryState {
    /// Opens and reports the marker.
    Healthy(ModificationMarker),
    /// Cannot be opened.
    Unavailable,
    /// Opens, but the marker cannot be read.
    Corrupted,
}

#[derive(Debug)]
struct MockRegistryInner {
    branch: String,
    repositories: Vec<(RepositoryId, MockRepositoryState)>,
    handles: Vec<Arc<MockRepository>>,
    installed: Option<Arc<MockRepository>>,
}

/// Mock registry.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockRegistry {
    inner: Arc<Mutex<MockRegistryInner>>,
}

impl MockRegistry {
    /// Empty registry on a branch.
    pub fn new(branch: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockRegistryInner {
                branch: branch.into(),
                repositories: Vec::new(),
                handles: Vec::new(),
                installed: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockRegistryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a healthy repository.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a valid repository identifier.
    pub fn with_repository(self, id: &str, marker: ModificationMarker) -> Self {
        self.set_state(id, MockRepositoryState::Healthy(marker));
        self
    }

    /// Attach an installed-packages repository.
    pub fn with_installed(self, marker: ModificationMarker) -> Self {
        if let Ok(id) = RepositoryId::new("installed") {
            let mut state = self.state();
            state.installed = Some(Arc::new(MockRepository::new(
                id,
                MockRepositoryState::Healthy(marker),
            )));
        }
        self
    }

    /// Set (or append) the state of a repository.
    ///
    /// Existing open handles observe the change.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a valid repository identifier.
    pub fn set_state(&self, id: &str, new_state: MockRepositoryState) {
        let id = RepositoryId::new(id).unwrap_or_else(|e| panic!("mock repository id: {e}"));
        let mut state = self.state();
        match state.repositories.iter_mut().find(|(rid, _)| *rid == id) {
            Some((_, s)) => *s = new_state.clone(),
            None => state.repositories.push((id.clone(), new_state.clone())),
        }
        if let Some(handle) = state.handles.iter().find(|h| h.id == id) {
            handle.set(new_state);
        }
    }

    /// Shorthand for a healthy marker change.
    pub fn set_marker(&self, id: &str, marker: ModificationMarker) {
        self.set_state(id, MockRepositoryState::Healthy(marker));
    }

    /// Drop a repository from the enabled list.
    pub fn remove(&self, id: &str) {
        let mut state = self.state();
        state.repositories.retain(|(rid, _)| rid.as_str() != id);
        state.handles.retain(|h| h.id.as_str() != id);
    }

    /// Change the active branch.
    pub fn set_branch(&self, branch: impl Into<String>) {
        self.state().branch = branch.into();
    }

    /// Total live-cache clears across open handles and the installed repository.
    pub fn cache_clears(&self) -> usize {
        let state = self.state();
        let handles: usize = state.handles.iter().map(|h| h.clears()).sum();
        handles + state.installed.as_ref().map_or(0, |h| h.clears())
    }
}

impl RepositoryRegistry for MockRegistry {
    fn enabled_repository_ids(&self) -> Vec<RepositoryId> {
        self.state()
            .repositories
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn branch(&self) -> String {
        self.state().branch.clone()
    }

    fn open(&self, id: &RepositoryId) -> Result<Arc<dyn RepositoryHandle>, RepositoryError> {
        let mut state = self.state();
        let repo_state = state
            .repositories
            .iter()
            .find(|(rid, _)| rid == id)
            .map(|(_, s)| s.clone())
            .ok_or_else(|| RepositoryError::Unavailable(id.clone()))?;

        if repo_state == MockRepositoryState::Unavailable {
            return Err(RepositoryError::Unavailable(id.clone()));
        }

        if let Some(handle) = state.handles.iter().find(|h| &h.id == id) {
            return Ok(Arc::clone(handle) as Arc<dyn RepositoryHandle>);
        }

        let handle = Arc::new(MockRepository::new(id.clone(), repo_state));
        state.handles.push(Arc::clone(&handle));
        Ok(handle)
    }

    fn open_handles(&self) -> Vec<Arc<dyn RepositoryHandle>> {
        self.state()
            .handles
            .iter()
            .map(|h| Arc::clone(h) as Arc<dyn RepositoryHandle>)
            .collect()
    }

    fn installed(&self) -> Option<Arc<dyn RepositoryHandle>> {
        self.state()
            .installed
            .as_ref()
            .map(|h| Arc::clone(h) as Arc<dyn RepositoryHandle>)
    }
}

/// Handle returned by [`MockRegistry::open`].
#[derive(Debug)]
pub struct MockRepository {
    id: RepositoryId,
    inner: Mutex<(MockRepositoryState, usize)>,
}

impl MockRepository {
    fn new(id: RepositoryId, state: MockRepositoryState) -> Self {
        Self {
            id,
            inner: Mutex::new((state, 0)),
        }
    }

    fn set(&self, state: MockRepositoryState) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).0 = state;
    }

    fn clears(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).1
    }
}

impl RepositoryHandle for MockRepository {
    fn id(&self) -> &RepositoryId {
        &self.id
    }

    fn modification_marker(&self) -> Result<ModificationMarker, RepositoryError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match &inner.0 {
            MockRepositoryState::Healthy(marker) => Ok(*marker),
            MockRepositoryState::Corrupted => Err(RepositoryError::Corrupted {
                id: self.id.clone(),
                reason: "mock corruption".to_string(),
            }),
            MockRepositoryState::Unavailable => Err(RepositoryError::Unavailable(self.id.clone())),
        }
    }

    fn clear_cache(&self) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).1 += 1;
    }
}
