//! cli
//!
//! Command-line interface layer for pkgfront.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration and build the collaborators a command needs
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. Handlers wire the configured registry, cache,
//! lock and daemon together and call into [`crate::cache`],
//! [`crate::service`] and [`crate::app`]. Async work runs on a runtime
//! created by the handler that needs it.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use std::path::PathBuf;

use anyhow::Result;

use crate::ui::output::Verbosity;

/// Flags shared by every command handler.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Explicit user config file
    pub config: Option<PathBuf>,
    /// Debug output requested
    pub debug: bool,
    /// Minimal output requested
    pub quiet: bool,
    /// Prompts allowed
    pub interactive: bool,
    /// UI loop stall diagnostics
    pub dumper: bool,
}

impl Context {
    /// Output verbosity derived from the flags.
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.debug)
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`, after logging is
/// initialized.
pub fn run(cli: Cli) -> Result<()> {
    let ctx = Context {
        config: cli.config.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
        interactive: cli.interactive(),
        dumper: cli.dumper,
    };

    commands::dispatch(cli.command, &ctx)
}
