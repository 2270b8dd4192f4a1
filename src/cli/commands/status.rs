//! status command - Show daemon, lock and repository status

use anyhow::Result;

use super::Services;
use crate::cache::RepositoryFingerprinter;
use crate::cli::Context;
use crate::core::ops::ResourceLock;
use crate::daemon::{DaemonService, SocketDaemon};
use crate::ui::output;

/// Print what the daemon is doing, who holds the lock and the current
/// fingerprint. Never starts an operation.
pub fn status(ctx: &Context) -> Result<()> {
    let services = Services::load(ctx)?;
    let daemon = SocketDaemon::new(
        services.config.daemon_socket(),
        services.config.connect_timeout(),
    )
    .with_query_timeout(services.config.query_timeout());

    let rt = tokio::runtime::Runtime::new()?;
    let daemon_fields = rt.block_on(daemon_status(&daemon));

    let lock = ResourceLock::open(&services.paths.resources_lock_path());
    let lock_state = match lock.probe_external_exclusive() {
        Ok(true) => "held exclusive".to_string(),
        Ok(false) => "free or shared".to_string(),
        Err(e) => format!("unknown ({})", e),
    };

    let fingerprinter = RepositoryFingerprinter::new(services.registry.clone(), ctx.verbosity());
    let report = fingerprinter.filtered_report();

    let mut fields = vec![("socket", daemon.socket().display().to_string())];
    fields.extend(daemon_fields);
    fields.push(("lock", lock_state));
    fields.push(("branch", report.branch.clone()));
    fields.push((
        "repositories",
        services
            .registry
            .enabled_repository_ids()
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    ));
    fields.push(("fingerprint", report.fingerprint.to_string()));
    if !report.skipped.is_empty() {
        fields.push((
            "skipped",
            report
                .skipped
                .iter()
                .map(|s| s.id.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        ));
    }
    let available = fingerprinter.available_repositories(&services.cache);
    fields.push((
        "available",
        if available.cached {
            "cached".to_string()
        } else {
            format!("{} repositories, cached now", available.repositories.len())
        },
    ));
    services.cache.sync();
    fields.push((
        "cache",
        services.cache.current_directory().display().to_string(),
    ));

    println!("{}", output::format_fields(&fields));
    Ok(())
}

async fn daemon_status(daemon: &SocketDaemon) -> Vec<(&'static str, String)> {
    if !daemon.service_available().await {
        return vec![("daemon", "not reachable".to_string())];
    }

    let mut fields = vec![("daemon", "reachable".to_string())];
    fields.push((
        "api",
        match daemon.api().await {
            Ok(api) if daemon.supported_apis().contains(&api) => api.to_string(),
            Ok(api) => format!("{} (unsupported)", api),
            Err(e) => format!("error: {}", e),
        },
    ));
    fields.push((
        "activity",
        match daemon.activity().await {
            Ok(activity) => activity.to_string(),
            Err(e) => format!("error: {}", e),
        },
    ));
    fields.push((
        "exclusive",
        match daemon.is_exclusive().await {
            Ok(exclusive) => exclusive.to_string(),
            Err(e) => format!("error: {}", e),
        },
    ));
    fields
}
