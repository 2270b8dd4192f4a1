//! app
//!
//! The UI event loop.
//!
//! # Design
//!
//! One loop owns the view state machine and the presenter. Background
//! tasks (attached daemon operations, initiator operations, operator input,
//! heartbeat) never touch either; they post [`UiEvent`]s on an unbounded
//! channel and the loop applies them in order.
//!
//! Closing while the view is locked, or while a daemon operation is being
//! followed, asks for confirmation first. When the presenter cannot ask
//! (operator input is owned by the command reader), a second close request
//! confirms. A confirmed close releases the resource lock and aborts every
//! background task.

mod events;
pub mod heartbeat;
mod input;
mod tasks;

use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub use events::{UiEvent, UserCommand};
pub use input::{parse_command, read_commands, HELP};
pub use tasks::TaskSet;

use crate::cache::{CacheStore, RepositoryFingerprinter};
use crate::daemon::OperationOutcome;
use crate::repository::RepositoryRegistry;
use crate::service::{ActivityCoordinator, CoordinatorError, LocalActivity, StartupState};
use crate::ui::output;
use crate::ui::presenter::{Notification, Presenter};
use crate::view::{ViewHooks, ViewState, ViewStateMachine};

/// Whether the loop keeps running after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Everything the loop needs.
pub struct AppContext {
    pub presenter: Arc<dyn Presenter>,
    pub coordinator: ActivityCoordinator,
    pub fingerprinter: RepositoryFingerprinter,
    pub cache: Arc<CacheStore>,
    pub registry: Arc<dyn RepositoryRegistry>,
    pub startup: StartupState,
    pub events: UnboundedSender<UiEvent>,
    pub tasks: TaskSet,
}

/// The UI loop.
pub struct App {
    machine: ViewStateMachine,
    ctx: AppContext,
    close_when_idle: bool,
    close_armed: bool,
}

struct PresenterHooks(Arc<dyn Presenter>);

impl ViewHooks for PresenterHooks {
    fn enter(&self, state: ViewState) {
        self.0.enter(state);
    }

    fn exit(&self, state: ViewState) {
        self.0.exit(state);
    }
}

impl App {
    /// Build the loop and enter the initial view.
    pub fn new(mut ctx: AppContext) -> Self {
        let machine =
            ViewStateMachine::with_hooks(Arc::new(PresenterHooks(Arc::clone(&ctx.presenter))));
        machine.start();

        if let Some(attached) = ctx.startup.attached.take() {
            ctx.tasks.track("attached-operation", &attached);
        }

        Self {
            machine,
            ctx,
            close_when_idle: false,
            close_armed: false,
        }
    }

    /// The view state machine.
    pub fn machine(&self) -> &ViewStateMachine {
        &self.machine
    }

    /// Consume events until the operator closes the client or every sender
    /// is gone. Background tasks are aborted and the lock released on exit.
    pub async fn run(mut self, mut events: UnboundedReceiver<UiEvent>) {
        while let Some(event) = events.recv().await {
            if self.handle(event) == Flow::Exit {
                break;
            }
        }
        self.shutdown();
    }

    /// Apply one event.
    pub fn handle(&mut self, event: UiEvent) -> Flow {
        match event {
            UiEvent::StartWorking { state, lock } => {
                if let Some(state) = state {
                    self.machine.transition(state, lock, false);
                }
            }
            UiEvent::RepositoriesUpdated { outcome } => {
                self.machine.unlock();
                self.ctx.presenter.notify(repositories_notification(&outcome));
                return self.after_operation();
            }
            UiEvent::ApplicationsManaged { outcome, activity } => {
                self.ctx
                    .presenter
                    .notify(applications_notification(&outcome, activity));
                return self.after_operation();
            }
            UiEvent::ShowWorkView => {
                self.machine.transition(ViewState::Work, false, true);
            }
            UiEvent::Transition(state) => {
                self.machine.transition(state, false, false);
            }
            UiEvent::Heartbeat(ack) => {
                let _ = ack.send(());
            }
            UiEvent::CloseRequested => return self.request_close(),
            UiEvent::InputClosed => {
                self.close_when_idle = true;
                if self.is_idle() {
                    return Flow::Exit;
                }
                self.ctx
                    .presenter
                    .info("input closed, waiting for the running operation");
            }
            UiEvent::Command(command) => return self.command(command),
        }
        Flow::Continue
    }

    fn is_idle(&self) -> bool {
        !self.machine.is_locked() && self.ctx.coordinator.local_activity() == LocalActivity::Ready
    }

    fn after_operation(&mut self) -> Flow {
        self.close_armed = false;
        // The completion event is sent before local activity is reset.
        if self.close_when_idle && !self.machine.is_locked() {
            return Flow::Exit;
        }
        Flow::Continue
    }

    fn request_close(&mut self) -> Flow {
        if self.is_idle() || self.close_armed {
            return Flow::Exit;
        }
        if self.ctx.presenter.ask_yes_no(
            "pkgfront",
            "An operation is in progress. Close pkgfront anyway?",
        ) {
            return Flow::Exit;
        }
        // A second request without an answer counts as confirmation.
        self.close_armed = true;
        self.ctx
            .presenter
            .info("close again to leave while the operation is running");
        Flow::Continue
    }

    fn command(&mut self, command: UserCommand) -> Flow {
        match command {
            UserCommand::Show(state) => {
                if !self.machine.transition(state, false, false) {
                    self.ctx.presenter.info("the view is locked while work is in progress");
                }
            }
            UserCommand::Update => self.spawn_operation("update-repositories", |c| async move {
                c.update_repositories().await
            }),
            UserCommand::Manage(request) => {
                self.spawn_operation("application-request", move |c| async move {
                    c.application_request(request).await
                })
            }
            UserCommand::Upgrade => self.spawn_operation("upgrade-system", |c| async move {
                c.upgrade_system().await
            }),
            UserCommand::Fingerprint => {
                let filtered = self.ctx.fingerprinter.filtered_fingerprint();
                let all = self.ctx.fingerprinter.all_fingerprint();
                let available = self.ctx.fingerprinter.available_repositories(&self.ctx.cache);
                let mut repositories = available.repositories.join(", ");
                if available.cached {
                    repositories.push_str(" (cached)");
                }
                self.ctx.presenter.info(&output::format_fields(&[
                    ("filtered", filtered.to_string()),
                    ("all", all.to_string()),
                    ("repositories", repositories),
                ]));
            }
            UserCommand::ClearCache => {
                self.ctx.cache.clear(self.ctx.registry.as_ref());
                self.ctx.presenter.info("cache cleared");
            }
            UserCommand::Status => {
                let snapshot = self.machine.snapshot();
                self.ctx.presenter.info(&output::format_fields(&[
                    ("view", snapshot.current.to_string()),
                    ("locked", snapshot.locked.to_string()),
                    ("activity", self.ctx.coordinator.local_activity().to_string()),
                    ("degraded", self.ctx.startup.degraded.to_string()),
                    (
                        "resource lock",
                        self.ctx
                            .coordinator
                            .session_lock_mode()
                            .map_or_else(|| "not held".to_string(), |m| m.to_string()),
                    ),
                    ("tasks", self.ctx.tasks.summary()),
                ]));
            }
            UserCommand::Help => self.ctx.presenter.info(HELP),
            UserCommand::Quit => return self.request_close(),
        }
        Flow::Continue
    }

    fn spawn_operation<F, Fut>(&self, name: &str, start: F)
    where
        F: FnOnce(ActivityCoordinator) -> Fut,
        Fut: std::future::Future<Output = Result<OperationOutcome, CoordinatorError>>
            + Send
            + 'static,
    {
        let activity = self.ctx.coordinator.local_activity();
        if activity != LocalActivity::Ready {
            self.ctx
                .presenter
                .info(&format!("busy: already {activity}"));
            return;
        }

        let operation = start(self.ctx.coordinator.clone());
        let task = name.to_string();
        self.ctx.tasks.spawn(name, async move {
            if let Err(e) = operation.await {
                tracing::warn!(%task, error = %e, "operation failed");
            }
        });
    }

    /// Release the lock and abort background tasks.
    fn shutdown(&mut self) {
        self.ctx.tasks.abort_all();
        self.ctx.startup.abort_tasks();
        self.ctx.coordinator.release_session_lock();
        self.ctx.cache.sync();
        tracing::debug!("UI loop finished");
    }

    /// Sender for posting events to this loop.
    pub fn sender(&self) -> UnboundedSender<UiEvent> {
        self.ctx.events.clone()
    }
}

fn repositories_notification(outcome: &OperationOutcome) -> Notification {
    if outcome.success {
        Notification::info("Repositories updated successfully!")
    } else {
        Notification::error(format!(
            "Repositories update error: {}",
            outcome.message.as_deref().unwrap_or("unknown error")
        ))
    }
}

fn applications_notification(outcome: &OperationOutcome, activity: LocalActivity) -> Notification {
    let notification = match (outcome.success, activity) {
        (true, LocalActivity::UpgradingSystem) => Notification::info("System upgraded successfully!"),
        (true, _) => Notification::info("Applications managed successfully!"),
        (false, LocalActivity::UpgradingSystem) => {
            Notification::error("System upgrade error: please check the upgrade log")
        }
        (false, _) => {
            Notification::error("Application management error: please check the management log")
        }
    };
    notification.with_work_action()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::core::paths::ClientPaths;
    use crate::core::privilege::StaticPolicy;
    use crate::core::types::ModificationMarker;
    use crate::daemon::mock::MockDaemon;
    use crate::repository::mock::MockRegistry;
    use crate::ui::output::Verbosity;
    use tempfile::TempDir;
    use tokio::sync::mpsc::unbounded_channel;

    #[derive(Default)]
    struct RecordingPresenter {
        log: Mutex<Vec<String>>,
        answer: bool,
    }

    impl RecordingPresenter {
        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn push(&self, entry: String) {
            self.log.lock().unwrap().push(entry);
        }
    }

    impl ViewHooks for RecordingPresenter {
        fn enter(&self, state: ViewState) {
            self.push(format!("enter {state}"));
        }

        fn exit(&self, state: ViewState) {
            self.push(format!("exit {state}"));
        }
    }

    impl Presenter for RecordingPresenter {
        fn show_message(&self, title: &str, message: &str) {
            self.push(format!("message {title}: {message}"));
        }

        fn ask_yes_no(&self, _title: &str, message: &str) -> bool {
            self.push(format!("ask {message}"));
            self.answer
        }

        fn notify(&self, notification: Notification) {
            self.push(format!("notify {notification}"));
        }

        fn info(&self, message: &str) {
            self.push(format!("info {message}"));
        }
    }

    fn app(answer: bool) -> (TempDir, Arc<RecordingPresenter>, App) {
        let temp = TempDir::new().unwrap();
        let paths = ClientPaths::new(
            temp.path().join("run"),
            temp.path().join("cache"),
            temp.path().join("db"),
        );
        let registry: Arc<dyn RepositoryRegistry> = Arc::new(
            MockRegistry::new("stable").with_repository("main", ModificationMarker::Revision(1)),
        );
        let cache = Arc::new(CacheStore::new(paths, None));
        let presenter = Arc::new(RecordingPresenter {
            answer,
            ..Default::default()
        });
        let (tx, _rx) = unbounded_channel();
        let coordinator = ActivityCoordinator::new(
            Arc::new(MockDaemon::new()),
            Arc::clone(&registry),
            Arc::clone(&cache),
            Arc::new(StaticPolicy(true)),
            tx.clone(),
        );
        let ctx = AppContext {
            presenter: presenter.clone(),
            coordinator,
            fingerprinter: RepositoryFingerprinter::new(Arc::clone(&registry), Verbosity::Quiet),
            cache,
            registry,
            startup: StartupState {
                degraded: false,
                activity: crate::daemon::DaemonActivity::Available,
                attached: None,
            },
            events: tx,
            tasks: TaskSet::new(),
        };
        (temp, presenter, App::new(ctx))
    }

    #[tokio::test]
    async fn enters_static_view_on_start() {
        let (_temp, presenter, app) = app(false);
        assert_eq!(app.machine().current(), ViewState::Static);
        assert_eq!(presenter.log(), vec!["enter static"]);
    }

    #[tokio::test]
    async fn start_working_locks_and_update_unlocks() {
        let (_temp, presenter, mut app) = app(false);
        app.handle(UiEvent::StartWorking {
            state: Some(ViewState::Work),
            lock: true,
        });
        assert_eq!(app.machine().current(), ViewState::Work);
        assert!(app.machine().is_locked());

        app.handle(UiEvent::Transition(ViewState::Browser));
        assert_eq!(app.machine().current(), ViewState::Work);

        app.handle(UiEvent::RepositoriesUpdated {
            outcome: OperationOutcome::ok(),
        });
        assert!(!app.machine().is_locked());
        assert!(presenter
            .log()
            .contains(&"notify Repositories updated successfully!".to_string()));
    }

    #[tokio::test]
    async fn show_work_view_ignores_lock() {
        let (_temp, _presenter, mut app) = app(false);
        app.handle(UiEvent::StartWorking {
            state: Some(ViewState::Browser),
            lock: true,
        });
        app.handle(UiEvent::ShowWorkView);
        assert_eq!(app.machine().current(), ViewState::Work);
    }

    #[tokio::test]
    async fn failed_upgrade_message() {
        let (_temp, presenter, mut app) = app(false);
        app.handle(UiEvent::ApplicationsManaged {
            outcome: OperationOutcome::failed(1, "x"),
            activity: LocalActivity::UpgradingSystem,
        });
        assert!(presenter.log().iter().any(|l| l.contains("System upgrade error")));
    }

    #[tokio::test]
    async fn close_while_locked_asks_first() {
        let (_temp, presenter, mut app) = app(false);
        app.handle(UiEvent::StartWorking {
            state: Some(ViewState::Work),
            lock: true,
        });
        assert_eq!(app.handle(UiEvent::CloseRequested), Flow::Continue);
        assert!(presenter.log().iter().any(|l| l.starts_with("ask ")));

        let (_temp, _presenter, mut app) = app_confirming();
        app.handle(UiEvent::StartWorking {
            state: Some(ViewState::Work),
            lock: true,
        });
        assert_eq!(app.handle(UiEvent::CloseRequested), Flow::Exit);
    }

    #[tokio::test]
    async fn second_close_confirms_when_unanswered() {
        let (_temp, _presenter, mut app) = app(false);
        app.handle(UiEvent::StartWorking {
            state: Some(ViewState::Work),
            lock: true,
        });
        assert_eq!(app.handle(UiEvent::CloseRequested), Flow::Continue);
        assert_eq!(app.handle(UiEvent::Command(UserCommand::Quit)), Flow::Exit);
    }

    fn app_confirming() -> (TempDir, Arc<RecordingPresenter>, App) {
        app(true)
    }

    #[tokio::test]
    async fn idle_close_does_not_ask() {
        let (_temp, presenter, mut app) = app(false);
        assert_eq!(app.handle(UiEvent::Command(UserCommand::Quit)), Flow::Exit);
        assert!(!presenter.log().iter().any(|l| l.starts_with("ask ")));
    }

    #[tokio::test]
    async fn input_closed_waits_for_operation() {
        let (_temp, _presenter, mut app) = app(false);
        app.handle(UiEvent::StartWorking {
            state: Some(ViewState::Work),
            lock: true,
        });
        assert_eq!(app.handle(UiEvent::InputClosed), Flow::Continue);
        assert_eq!(
            app.handle(UiEvent::RepositoriesUpdated {
                outcome: OperationOutcome::ok()
            }),
            Flow::Exit
        );
    }

    #[tokio::test]
    async fn heartbeat_is_answered() {
        let (_temp, _presenter, mut app) = app(false);
        let (ack, answer) = tokio::sync::oneshot::channel();
        app.handle(UiEvent::Heartbeat(ack));
        assert!(answer.await.is_ok());
    }

    #[tokio::test]
    async fn status_and_fingerprint_commands() {
        let (_temp, presenter, mut app) = app(false);
        app.handle(UiEvent::Command(UserCommand::Status));
        app.handle(UiEvent::Command(UserCommand::Fingerprint));
        let log = presenter.log();
        assert!(log.iter().any(|l| l.contains("activity:") && l.contains("ready")));
        assert!(log.iter().any(|l| l.contains("not held")));
        assert!(log.iter().any(|l| l.contains("filtered:")));

        app.handle(UiEvent::Command(UserCommand::Fingerprint));
        assert!(presenter.log().iter().any(|l| l.contains("(cached)")));
    }
}
