//! pkgfront - interactive front-end for a privileged package management daemon
//!
//! pkgfront lets an unprivileged operator drive a package-management daemon:
//! it checks that it may run, agrees with the daemon on who owns the shared
//! resource lock, follows any operation already in flight, and keeps derived
//! data cached under a key that changes whenever a repository does.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, wires collaborators)
//! - [`app`] - UI event loop owning the view state and the presenter
//! - [`service`] - Startup reconciliation and daemon operation tracking
//! - [`view`] - View state machine
//! - [`cache`] - Repository fingerprints and the on-disk cache
//! - [`repository`] - Repository registry abstraction
//! - [`daemon`] - Daemon client abstraction and transports
//! - [`core`] - Domain types, configuration, paths, privilege and locking
//! - [`ui`] - Output, prompts and presentation
//!
//! # Correctness Invariants
//!
//! 1. An interactive session holds the resource lock shared until it exits,
//!    unless the daemon holds it exclusive and is being followed
//! 2. At most one daemon operation is followed at a time
//! 3. View state changes only on the UI loop
//! 4. Clearing the cache never fails

pub mod app;
pub mod cache;
pub mod cli;
pub mod core;
pub mod daemon;
pub mod repository;
pub mod service;
pub mod ui;
pub mod view;
