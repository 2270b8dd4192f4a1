//! lock command - Try to take the resource lock

use std::time::Duration;

use anyhow::{bail, Context as _, Result};

use super::Services;
use crate::cli::Context;
use crate::core::ops::{LockMode, LockWait, ResourceLock};
use crate::ui::output;

/// Try to take the resource lock, report, and release it.
///
/// Fails when the lock could not be taken within the bound.
pub fn lock(ctx: &Context, exclusive: bool, timeout_ms: Option<u64>) -> Result<()> {
    let services = Services::load(ctx)?;
    let path = services.paths.resources_lock_path();
    let wait = match timeout_ms {
        Some(ms) => LockWait::Timeout(Duration::from_millis(ms)),
        None => LockWait::Immediate,
    };
    let mode = LockMode::from_exclusive(exclusive);

    let mut lock = ResourceLock::open(&path);
    let acquired = lock
        .acquire(exclusive, wait)
        .with_context(|| format!("Failed to use lock file {}", path.display()))?;
    if !acquired {
        bail!("resource lock is busy, cannot take it {}", mode);
    }

    output::print(
        format!("Acquired {} lock on {}", mode, path.display()),
        ctx.verbosity(),
    );
    lock.release_all().context("Failed to release the resource lock")?;
    Ok(())
}
