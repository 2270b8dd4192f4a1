//! app::events
//!
//! Messages handed to the UI loop by background tasks.

use tokio::sync::oneshot;

use crate::daemon::{ApplicationRequest, OperationOutcome};
use crate::service::LocalActivity;
use crate::view::ViewState;

/// Operator commands read from the input task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Switch view.
    Show(ViewState),
    /// Ask the daemon to update repositories.
    Update,
    /// Ask the daemon to install or remove an application.
    Manage(ApplicationRequest),
    /// Ask the daemon to upgrade the system.
    Upgrade,
    /// Print fingerprints.
    Fingerprint,
    /// Wipe the cache.
    ClearCache,
    /// Print view and activity state.
    Status,
    /// Print the command list.
    Help,
    /// Close the client.
    Quit,
}

/// One event for the UI loop.
#[derive(Debug)]
pub enum UiEvent {
    /// A daemon operation started; optionally switch view and lock it.
    StartWorking {
        state: Option<ViewState>,
        lock: bool,
    },
    /// A repositories update finished.
    RepositoriesUpdated { outcome: OperationOutcome },
    /// An application request or system upgrade finished.
    ApplicationsManaged {
        outcome: OperationOutcome,
        activity: LocalActivity,
    },
    /// Force the work view, ignoring the lock.
    ShowWorkView,
    /// Plain transition request from another task.
    Transition(ViewState),
    /// Liveness probe; the loop answers on the channel.
    Heartbeat(oneshot::Sender<()>),
    /// The operator or a signal asked to close.
    CloseRequested,
    /// Operator input reached end of file; close once idle.
    InputClosed,
    /// Operator input.
    Command(UserCommand),
}
