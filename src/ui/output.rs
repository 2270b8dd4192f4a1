//! ui::output
//!
//! Operator-facing output.
//!
//! # Design
//!
//! Everything the operator reads goes through here and respects the quiet
//! flag. Diagnostics for developers go through `tracing` instead.

use std::fmt::Display;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - errors only
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print a debug message (only in debug mode).
pub fn debug(message: impl Display, verbosity: Verbosity) {
    if verbosity == Verbosity::Debug {
        eprintln!("[debug] {}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Print a titled dialog box (always shown).
///
/// Used for fatal startup messages, which must reach the operator even in
/// quiet mode.
pub fn dialog(title: &str, message: impl Display) {
    let message = message.to_string();
    let width = title.len().max(message.len()) + 4;
    eprintln!("+{}+", "-".repeat(width));
    eprintln!("| {:<w$} |", title, w = width - 2);
    eprintln!("| {:<w$} |", message, w = width - 2);
    eprintln!("+{}+", "-".repeat(width));
}

/// Format `key: value` pairs as aligned lines.
pub fn format_fields<K: Display, V: Display>(fields: &[(K, V)]) -> String {
    let keys: Vec<String> = fields.iter().map(|(k, _)| k.to_string()).collect();
    let width = keys.iter().map(String::len).max().unwrap_or(0);
    keys.iter()
        .zip(fields)
        .map(|(k, (_, v))| format!("{:<width$}  {}", format!("{k}:"), v, width = width + 1))
        .collect::<Vec<_>>()
        .join("\n")
}
