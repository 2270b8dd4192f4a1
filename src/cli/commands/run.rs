//! run command - Start the interactive front-end
//!
//! Startup order:
//! 1. Load configuration and wire collaborators
//! 2. Reconcile with the daemon (authorization, API, lock, activity)
//! 3. Spawn the operator input, Ctrl-C and optional heartbeat tasks
//! 4. Run the UI loop until the operator closes it

use std::sync::Arc;

use anyhow::{Context as _, Result};
use tokio::io::BufReader;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use super::Services;
use crate::app::{self, heartbeat, App, AppContext, TaskSet, UiEvent};
use crate::cache::RepositoryFingerprinter;
use crate::cli::Context;
use crate::core::ops::ResourceLock;
use crate::core::privilege::GroupMembership;
use crate::daemon::{DaemonService, SocketDaemon};
use crate::service::ActivityCoordinator;
use crate::ui::presenter::{Presenter, TerminalPresenter};

/// Start the front-end and block until it exits.
pub fn run(ctx: &Context) -> Result<()> {
    let services = Services::load(ctx)?;
    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(run_async(ctx, services));
    // The stdin reader may still sit in a blocking read.
    rt.shutdown_background();
    result
}

async fn run_async(ctx: &Context, services: Services) -> Result<()> {
    let (events, receiver) = unbounded_channel();

    let daemon: Arc<dyn DaemonService> = Arc::new(
        SocketDaemon::new(
            services.config.daemon_socket(),
            services.config.connect_timeout(),
        )
        .with_query_timeout(services.config.query_timeout()),
    );
    // Operator input belongs to the command reader, so the presenter never
    // reads stdin itself.
    let presenter: Arc<dyn Presenter> = Arc::new(TerminalPresenter::new(ctx.verbosity(), false));

    let coordinator = ActivityCoordinator::new(
        daemon,
        Arc::clone(&services.registry),
        Arc::clone(&services.cache),
        Arc::new(GroupMembership::new(services.config.group())),
        events.clone(),
    )
    .with_session_lock_wait(services.config.lock_timeout());

    let lock = ResourceLock::open(&services.paths.resources_lock_path());
    let startup = match coordinator.reconcile_startup(lock).await {
        Ok(startup) => startup,
        Err(e) => {
            presenter.show_message("pkgfront", &e.to_string());
            return Err(e).context("Startup failed");
        }
    };
    tracing::info!(
        activity = %startup.activity,
        degraded = startup.degraded,
        "startup reconciled"
    );
    if startup.degraded {
        presenter.info("The daemon holds the resource lock, following its operation");
    }

    let tasks = TaskSet::new();
    spawn_background(ctx, &tasks, &events);

    let app = App::new(AppContext {
        presenter: Arc::clone(&presenter),
        coordinator,
        fingerprinter: RepositoryFingerprinter::new(
            Arc::clone(&services.registry),
            ctx.verbosity(),
        ),
        cache: services.cache,
        registry: services.registry,
        startup,
        events,
        tasks,
    });
    presenter.info("type 'help' for the list of commands");
    app.run(receiver).await;
    Ok(())
}

fn spawn_background(ctx: &Context, tasks: &TaskSet, events: &UnboundedSender<UiEvent>) {
    tasks.spawn(
        "operator-input",
        app::read_commands(BufReader::new(tokio::io::stdin()), events.clone()),
    );

    let close = events.clone();
    tasks.spawn("ctrl-c", async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if close.send(UiEvent::CloseRequested).is_err() {
                return;
            }
        }
    });

    if ctx.dumper {
        tasks.spawn("heartbeat", heartbeat::run(events.clone(), tasks.clone()));
    }
}
