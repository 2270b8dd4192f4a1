//! config command - Print the effective configuration

use anyhow::{Context as _, Result};

use super::load_config;
use crate::cli::Context;

/// Print the files that were read and the effective configuration as TOML.
pub fn show(ctx: &Context) -> Result<()> {
    let loaded = load_config(ctx)?;

    println!("# Sources");
    if loaded.sources.is_empty() {
        println!("# (none, defaults only)");
    }
    for source in &loaded.sources {
        println!("# {}", source.display());
    }
    println!();

    let effective = loaded.config.effective();
    let rendered =
        toml::to_string_pretty(&effective).context("Failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}
