//! core::ops::lock
//!
//! Cross-process shared/exclusive resource lock.
//!
//! # Architecture
//!
//! The resource lock is the only cross-process mutual-exclusion primitive
//! of the client. Any number of processes may hold it SHARED at once; an
//! EXCLUSIVE holder excludes everyone else. The daemon takes it EXCLUSIVE
//! while it mutates package state, clients take it SHARED while they read.
//!
//! The concrete primitive sits behind [`LockBackend`]. [`FileLockBackend`]
//! uses OS-level advisory locks via `fs2`, which work across processes.
//!
//! # Storage
//!
//! - `<lock_dir>/resources.lock` - Lock file with OS-level shared/exclusive lock
//!
//! # Invariants
//!
//! - Acquisition never blocks past its [`LockWait`] bound
//! - Failing to acquire within the bound is `Ok(false)`, not an error
//! - Lock is automatically released on drop (RAII pattern)
//! - Post-acquire hooks run after every fresh acquisition
//!
//! # Example
//!
//! ```ignore
//! use pkgfront::core::ops::lock::{LockWait, ResourceLock};
//!
//! let mut lock = ResourceLock::open(&paths.resources_lock_path());
//! if lock.acquire(false, LockWait::Immediate)? {
//!     // shared access
//! }
//! // Lock automatically released when dropped
//! ```

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use thiserror::Error;

/// Polling interval when waiting for the lock (100ms).
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock for a reason other than contention.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),

    /// A shared holder asked for exclusive access.
    #[error("cannot upgrade a shared lock to exclusive; release it first")]
    UpgradeUnsupported,

    /// I/O error during lock operations.
    #[error("lock i/o error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Lock mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Many holders may coexist.
    Shared,
    /// Exactly one holder system-wide.
    Exclusive,
}

impl LockMode {
    /// Mode from the boolean used at the public surface.
    pub fn from_exclusive(exclusive: bool) -> Self {
        if exclusive {
            Self::Exclusive
        } else {
            Self::Shared
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => write!(f, "shared"),
            LockMode::Exclusive => write!(f, "exclusive"),
        }
    }
}

/// How long an acquisition may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockWait {
    /// Try once and return.
    Immediate,
    /// Poll until the duration elapses.
    Timeout(Duration),
}

/// Capability interface over the concrete cross-process primitive.
///
/// Implementations only deal with one holder (this process); counting
/// and hooks live in [`ResourceLock`].
pub trait LockBackend: Send + fmt::Debug {
    /// Try to take the lock shared. `Ok(false)` on contention.
    fn try_acquire_shared(&mut self) -> Result<bool, LockError>;

    /// Try to take the lock exclusive. `Ok(false)` on contention.
    fn try_acquire_exclusive(&mut self) -> Result<bool, LockError>;

    /// Release whatever this backend holds. Releasing nothing is a no-op.
    fn release(&mut self) -> Result<(), LockError>;

    /// Whether some other holder currently has the lock exclusive.
    fn probe_external_exclusive(&self) -> Result<bool, LockError>;
}

/// Advisory file lock backend (`flock` semantics via `fs2`).
///
/// Every backend instance opens its own file description, so two
/// instances in the same process contend exactly like two processes.
#[derive(Debug)]
pub struct FileLockBackend {
    path: PathBuf,
    file: Option<File>,
    held: Option<LockMode>,
}

impl FileLockBackend {
    /// Backend over the given lock file. Nothing is opened yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            held: None,
        }
    }

    /// Path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_file(path: &Path) -> Result<File, LockError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                LockError::CreateFailed(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e)))
    }

    fn try_mode(&mut self, mode: LockMode) -> Result<bool, LockError> {
        if self.file.is_none() {
            self.file = Some(Self::open_file(&self.path)?);
        }
        let Some(file) = self.file.as_ref() else {
            return Ok(false);
        };

        let attempt = match mode {
            LockMode::Shared => FileExt::try_lock_shared(file),
            LockMode::Exclusive => FileExt::try_lock_exclusive(file),
        };

        match attempt {
            Ok(()) => {
                self.held = Some(mode);
                Ok(true)
            }
            Err(e) if is_contention(&e) => Ok(false),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }
}

fn is_contention(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl LockBackend for FileLockBackend {
    fn try_acquire_shared(&mut self) -> Result<bool, LockError> {
        self.try_mode(LockMode::Shared)
    }

    fn try_acquire_exclusive(&mut self) -> Result<bool, LockError> {
        self.try_mode(LockMode::Exclusive)
    }

    fn release(&mut self) -> Result<(), LockError> {
        if self.held.take().is_some() {
            if let Some(file) = self.file.as_ref() {
                FileExt::unlock(file)
                    .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
            }
        }
        Ok(())
    }

    fn probe_external_exclusive(&self) -> Result<bool, LockError> {
        if self.held == Some(LockMode::Exclusive) {
            return Ok(false);
        }
        if !self.path.exists() {
            return Ok(false);
        }

        let probe = Self::open_file(&self.path)?;
        match FileExt::try_lock_shared(&probe) {
            Ok(()) => {
                let _ = FileExt::unlock(&probe);
                Ok(false)
            }
            Err(e) if is_contention(&e) => Ok(true),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }
}

/// Hook run after every fresh acquisition.
pub type PostAcquireHook = Arc<dyn Fn(LockMode) + Send + Sync>;

/// Handle returned by [`ResourceLock::add_post_acquire_hook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookId(usize);

/// The client's view of the shared/exclusive resource lock.
///
/// Re-acquiring a lock this process already holds nests: each successful
/// [`acquire`](Self::acquire) needs a matching [`release`](Self::release).
/// Dropping the lock releases it completely.
pub struct ResourceLock {
    backend: Box<dyn LockBackend>,
    mode: Option<LockMode>,
    depth: usize,
    hooks: Vec<(HookId, PostAcquireHook)>,
    next_hook: usize,
}

impl fmt::Debug for ResourceLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceLock")
            .field("backend", &self.backend)
            .field("mode", &self.mode)
            .field("depth", &self.depth)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl ResourceLock {
    /// Resource lock over the given backend.
    pub fn new(backend: Box<dyn LockBackend>) -> Self {
        Self {
            backend,
            mode: None,
            depth: 0,
            hooks: Vec::new(),
            next_hook: 0,
        }
    }

    /// Resource lock over an advisory lock file.
    pub fn open(path: &Path) -> Self {
        Self::new(Box::new(FileLockBackend::new(path)))
    }

    /// Register a hook run after every fresh acquisition.
    pub fn add_post_acquire_hook(&mut self, hook: PostAcquireHook) -> HookId {
        let id = HookId(self.next_hook);
        self.next_hook += 1;
        self.hooks.push((id, hook));
        id
    }

    /// Remove a previously registered hook. Unknown ids are ignored.
    pub fn remove_post_acquire_hook(&mut self, id: HookId) {
        self.hooks.retain(|(hook_id, _)| *hook_id != id);
    }

    /// Attempt to take the lock in the requested mode.
    ///
    /// Returns `Ok(false)` when the lock could not be taken within `wait`.
    /// Polls at 100ms intervals when a timeout is given.
    ///
    /// # Errors
    ///
    /// - [`LockError::UpgradeUnsupported`] when a shared holder asks for exclusive
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock fails for other reasons
    pub fn acquire(&mut self, exclusive: bool, wait: LockWait) -> Result<bool, LockError> {
        let mode = LockMode::from_exclusive(exclusive);

        match (self.mode, mode) {
            (Some(LockMode::Shared), LockMode::Exclusive) => {
                return Err(LockError::UpgradeUnsupported)
            }
            (Some(_), _) => {
                self.depth += 1;
                return Ok(true);
            }
            (None, _) => {}
        }

        let deadline = match wait {
            LockWait::Immediate => None,
            LockWait::Timeout(timeout) => Some(Instant::now() + timeout),
        };

        loop {
            let acquired = match mode {
                LockMode::Shared => self.backend.try_acquire_shared()?,
                LockMode::Exclusive => self.backend.try_acquire_exclusive()?,
            };

            if acquired {
                self.mode = Some(mode);
                self.depth = 1;
                tracing::debug!(%mode, "resource lock acquired");
                for (_, hook) in &self.hooks {
                    hook(mode);
                }
                return Ok(true);
            }

            match deadline {
                Some(deadline) if Instant::now() < deadline => thread::sleep(LOCK_POLL_INTERVAL),
                _ => {
                    tracing::debug!(%mode, "resource lock busy");
                    return Ok(false);
                }
            }
        }
    }

    /// Release one level of the lock.
    ///
    /// Releasing an unheld lock is a no-op.
    pub fn release(&mut self) -> Result<(), LockError> {
        match self.depth {
            0 => Ok(()),
            1 => {
                self.depth = 0;
                self.mode = None;
                tracing::debug!("resource lock released");
                self.backend.release()
            }
            _ => {
                self.depth -= 1;
                Ok(())
            }
        }
    }

    /// Release the lock no matter how deeply it is held.
    pub fn release_all(&mut self) -> Result<(), LockError> {
        if self.depth > 0 {
            self.depth = 1;
        }
        self.release()
    }

    /// Whether this process currently holds the lock.
    pub fn is_held(&self) -> bool {
        self.mode.is_some()
    }

    /// Mode currently held, if any.
    pub fn mode(&self) -> Option<LockMode> {
        self.mode
    }

    /// Whether some other holder has the lock exclusive.
    pub fn probe_external_exclusive(&self) -> Result<bool, LockError> {
        self.backend.probe_external_exclusive()
    }
}

impl Drop for ResourceLock {
    fn drop(&mut self) {
        // Best-effort release on drop - ignore errors since we're dropping
        let _ = self.release_all();
    }
}
