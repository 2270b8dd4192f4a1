//! daemon
//!
//! Client side of the privileged package-management daemon.
//!
//! # Modules
//!
//! - `traits`: [`DaemonService`] and the activity/outcome types
//! - [`socket`]: line-delimited JSON over a Unix socket
//! - [`mock`]: mock implementation for deterministic testing
//!
//! Nothing outside `cli` names a concrete implementation; the coordinator
//! only sees `Arc<dyn DaemonService>`.

pub mod mock;
pub mod socket;
mod traits;

pub use socket::SocketDaemon;
pub use traits::*;
