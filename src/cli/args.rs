//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--config <path>`: Read this user config file instead of the default one
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//! - `--no-interactive`: Never prompt
//! - `--dumper`: Log UI loop stalls with a task summary

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// pkgfront - interactive front-end for the package management daemon
#[derive(Parser, Debug)]
#[command(name = "pkgfront")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Read this user config file instead of the default one
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output; implies --no-interactive
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable interactive prompts
    #[arg(long, global = true)]
    pub no_interactive: bool,

    /// Log an error with the live task list when the UI loop stalls
    #[arg(long, global = true)]
    pub dumper: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }

    /// Determine if interactive mode is enabled.
    ///
    /// Interactive unless `--no-interactive` or `--quiet` was given or
    /// stdin is not a terminal.
    pub fn interactive(&self) -> bool {
        !self.no_interactive && !self.quiet && std::io::stdin().is_terminal()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the interactive front-end
    #[command(
        name = "run",
        long_about = "Start the interactive front-end.\n\n\
            Checks authorization, daemon reachability and API compatibility, takes \
            the resource lock shared, and then follows whatever the daemon is doing. \
            Commands are read from stdin, one per line; type 'help' for the list.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Start and update repositories
    pkgfront run
    > update

    # Scripted session
    printf 'install app-misc/foo\\nquit\\n' | pkgfront run

    # Diagnose a hanging interface
    pkgfront --dumper --debug run"
    )]
    Run,

    /// Print repository fingerprints
    #[command(
        name = "fingerprint",
        long_about = "Print the fingerprint of the enabled repositories.\n\n\
            The fingerprint changes whenever a repository database is modified or \
            the branch changes. By default package repositories are left out; \
            --all includes them.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Fingerprint used by the cache
    pkgfront fingerprint

    # Include package repositories
    pkgfront fingerprint --all

    # Cache key of the available packages list
    pkgfront fingerprint --key"
    )]
    Fingerprint {
        /// Include package repositories
        #[arg(long, conflicts_with = "key")]
        all: bool,

        /// Print the available-packages cache key instead
        #[arg(long)]
        key: bool,

        /// Print a JSON report with included and skipped repositories
        #[arg(long)]
        json: bool,
    },

    /// Manage the on-disk cache
    #[command(name = "cache")]
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Take the resource lock and report whether it was acquired
    #[command(
        name = "lock",
        long_about = "Try to take the resource lock.\n\n\
            Shared by default; --exclusive asks for exclusive access. Without \
            --timeout the attempt returns immediately. Exits with status 1 when \
            the lock could not be taken.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Is anyone holding the lock exclusively?
    pkgfront lock

    # Wait up to five seconds for exclusive access
    pkgfront lock --exclusive --timeout 5000"
    )]
    Lock {
        /// Ask for exclusive access
        #[arg(long)]
        exclusive: bool,

        /// Wait up to this many milliseconds
        #[arg(long, value_name = "MS")]
        timeout: Option<u64>,
    },

    /// Show daemon, lock and repository status
    #[command(name = "status")]
    Status,

    /// Print the effective configuration
    #[command(name = "config")]
    Config,

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        long_about = "Generate shell completion scripts for tab-completion.\n\n\
            Outputs a completion script for the specified shell. Add the output \
            to your shell's configuration to enable tab-completion for pkgfront commands.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    pkgfront completion bash >> ~/.bashrc

    # Zsh
    pkgfront completion zsh > ~/.zfunc/_pkgfront

    # Fish
    pkgfront completion fish > ~/.config/fish/completions/pkgfront.fish"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Cache subcommands.
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Wipe and recreate the cache directory
    Clear,
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["pkgfront", "fingerprint", "--all", "--debug"]).unwrap();
        assert!(cli.debug);
        assert!(matches!(
            cli.command,
            Command::Fingerprint {
                all: true,
                key: false,
                json: false
            }
        ));
    }

    #[test]
    fn all_and_key_conflict() {
        assert!(Cli::try_parse_from(["pkgfront", "fingerprint", "--all", "--key"]).is_err());
    }

    #[test]
    fn quiet_is_never_interactive() {
        let cli = Cli::try_parse_from(["pkgfront", "-q", "status"]).unwrap();
        assert!(!cli.interactive());
    }
}
