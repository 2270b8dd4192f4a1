//! repository
//!
//! Access to the repositories whose freshness the client tracks.
//!
//! # Modules
//!
//! - `traits`: [`RepositoryRegistry`] and [`RepositoryHandle`]
//! - [`directory`]: registry over the on-disk database directory
//! - [`mock`]: in-memory registry for deterministic testing

pub mod directory;
pub mod mock;
mod traits;

pub use directory::DirectoryRegistry;
pub use traits::*;
