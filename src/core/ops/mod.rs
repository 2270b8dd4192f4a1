//! core::ops
//!
//! Cross-process locking.
//!
//! # Modules
//!
//! - [`lock`] - Shared/exclusive resource lock
//!
//! # Architecture
//!
//! Every operation that reads package state:
//! 1. Acquires the resource lock SHARED (or observes that the daemon holds it EXCLUSIVE)
//! 2. Reads repository databases and caches
//! 3. Releases the lock on every exit path

pub mod lock;

pub use lock::{
    FileLockBackend, HookId, LockBackend, LockError, LockMode, LockWait, PostAcquireHook,
    ResourceLock,
};
