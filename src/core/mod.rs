//! core
//!
//! Core domain types, configuration, paths, privilege checks and locking.
//!
//! # Modules
//!
//! - [`types`] - Strong types: RepositoryId, ModificationMarker, Fingerprint, etc.
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized path routing for client storage
//! - [`privilege`] - Local authorization checks
//! - [`ops`] - Cross-process resource locking
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Hashing is deterministic

pub mod config;
pub mod ops;
pub mod paths;
pub mod privilege;
pub mod types;
