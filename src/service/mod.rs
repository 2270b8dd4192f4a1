//! service
//!
//! Coordination with the daemon.
//!
//! See [`coordinator`] for the startup protocol.

pub mod coordinator;

pub use coordinator::{
    ActivityCoordinator, CoordinatorError, LocalActivity, StartupError, StartupState,
};
