//! cache command - Wipe the on-disk cache

use anyhow::Result;

use super::Services;
use crate::cli::Context;
use crate::ui::output;

/// Remove and recreate the cache directory.
///
/// Failures are logged by the store; the command itself always succeeds.
pub fn clear(ctx: &Context) -> Result<()> {
    let services = Services::load(ctx)?;
    services.cache.clear(services.registry.as_ref());

    output::print(
        format!("Cache cleared: {}", services.cache.current_directory().display()),
        ctx.verbosity(),
    );
    Ok(())
}
