//! service::coordinator
//!
//! Coordination between this client, the daemon and other package managers.
//!
//! # Startup Reconciliation
//!
//! [`ActivityCoordinator::reconcile_startup`] runs once, strictly in order:
//!
//! 1. privilege check
//! 2. daemon reachability
//! 3. API compatibility
//! 4. shared resource lock, falling back to "exclusive observed" mode when
//!    the daemon itself holds the lock exclusively
//! 5. daemon activity, attaching as an observer to operations in flight
//!
//! Every refusal is a [`StartupError`]. Nothing is presented from here; the
//! caller shows the message, drops the returned lock and exits.
//!
//! # Local Activity
//!
//! At most one daemon operation is followed at a time. [`LocalActivity`]
//! records which; initiator operations refuse with
//! [`CoordinatorError::Busy`] unless it is [`LocalActivity::Ready`].
//!
//! # Session Lock
//!
//! The shared resource lock taken at startup belongs to the coordinator.
//! The daemon needs it exclusive to mutate, so every daemon operation
//! releases it first and takes it back shared, within the configured wait,
//! once the operation finishes. This also applies to operations followed in
//! exclusive-observed mode, where the lock was never held.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::app::UiEvent;
use crate::cache::CacheStore;
use crate::core::ops::{LockError, LockMode, LockWait, ResourceLock};
use crate::core::privilege::AccessPolicy;
use crate::daemon::{
    ApplicationRequest, DaemonActivity, DaemonError, DaemonService, OperationOutcome, Role,
};
use crate::repository::{clear_live_caches, RepositoryRegistry};
use crate::view::ViewState;

/// Default bound for taking the session lock back after an operation.
const DEFAULT_SESSION_LOCK_WAIT: Duration = Duration::from_secs(5);

/// Polling interval while waiting for the session lock.
const SESSION_LOCK_POLL: Duration = Duration::from_millis(100);

/// What this client is currently following.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalActivity {
    Ready,
    UpdatingRepositories,
    ManagingApplications,
    UpgradingSystem,
}

impl fmt::Display for LocalActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::UpdatingRepositories => write!(f, "updating repositories"),
            Self::ManagingApplications => write!(f, "managing applications"),
            Self::UpgradingSystem => write!(f, "upgrading system"),
        }
    }
}

/// Fatal startup outcomes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StartupError {
    #[error("You are not authorized to run pkgfront")]
    Unauthorized,

    #[error("The package manager service is not available")]
    ServiceUnavailable,

    #[error("API mismatch, please update pkgfront and the daemon (daemon API {daemon}, supported {supported:?})")]
    ApiMismatch { daemon: u32, supported: Vec<u32> },

    #[error("Another application manager is active")]
    AnotherManagerActive,

    #[error("Background service is currently unavailable")]
    ExclusiveUnavailable,

    #[error("Background service is currently not available")]
    DaemonNotAvailable,

    #[error("Background service is currently busy")]
    DaemonBusy,

    #[error("Background service is incompatible with pkgfront (activity {0})")]
    DaemonIncompatible(i32),

    #[error("cannot use the resource lock: {0}")]
    Lock(String),
}

/// Errors from initiator operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("busy: already {0}")]
    Busy(LocalActivity),

    #[error(transparent)]
    Daemon(#[from] DaemonError),
}

/// Result of a successful reconciliation.
///
/// The resource lock itself stays with the coordinator, see
/// [`ActivityCoordinator::session_lock_mode`].
#[derive(Debug)]
pub struct StartupState {
    /// The daemon holds the resource lock exclusively.
    pub degraded: bool,
    /// Daemon activity observed during startup.
    pub activity: DaemonActivity,
    /// Task following an operation that was already in flight.
    pub attached: Option<JoinHandle<()>>,
}

impl StartupState {
    /// Abort the attached task, if any.
    pub fn abort_tasks(&mut self) {
        if let Some(task) = self.attached.take() {
            task.abort();
        }
    }
}

/// Resets local activity to ready when dropped.
struct ActivityGuard {
    local: Arc<Mutex<LocalActivity>>,
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        *self.local.lock().unwrap_or_else(|e| e.into_inner()) = LocalActivity::Ready;
    }
}

/// Startup reconciliation and daemon operation tracking.
#[derive(Clone)]
pub struct ActivityCoordinator {
    daemon: Arc<dyn DaemonService>,
    registry: Arc<dyn RepositoryRegistry>,
    cache: Arc<CacheStore>,
    policy: Arc<dyn AccessPolicy>,
    events: UnboundedSender<UiEvent>,
    local: Arc<Mutex<LocalActivity>>,
    session: Arc<Mutex<Option<ResourceLock>>>,
    session_wait: Duration,
}

impl fmt::Debug for ActivityCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityCoordinator")
            .field("local_activity", &self.local_activity())
            .finish_non_exhaustive()
    }
}

impl ActivityCoordinator {
    pub fn new(
        daemon: Arc<dyn DaemonService>,
        registry: Arc<dyn RepositoryRegistry>,
        cache: Arc<CacheStore>,
        policy: Arc<dyn AccessPolicy>,
        events: UnboundedSender<UiEvent>,
    ) -> Self {
        Self {
            daemon,
            registry,
            cache,
            policy,
            events,
            local: Arc::new(Mutex::new(LocalActivity::Ready)),
            session: Arc::new(Mutex::new(None)),
            session_wait: DEFAULT_SESSION_LOCK_WAIT,
        }
    }

    /// Bound the wait for taking the session lock back after an operation.
    pub fn with_session_lock_wait(mut self, wait: Duration) -> Self {
        self.session_wait = wait;
        self
    }

    fn local(&self) -> MutexGuard<'_, LocalActivity> {
        self.local.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// What this client is currently following.
    pub fn local_activity(&self) -> LocalActivity {
        *self.local()
    }

    fn session(&self) -> MutexGuard<'_, Option<ResourceLock>> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mode of the session lock, `None` while it is not held.
    pub fn session_lock_mode(&self) -> Option<LockMode> {
        self.session().as_ref().and_then(ResourceLock::mode)
    }

    /// Release the session lock completely. Releasing an unheld lock is a
    /// no-op.
    pub fn release_session_lock(&self) {
        if let Some(lock) = self.session().as_mut() {
            if let Err(e) = lock.release_all() {
                tracing::warn!(error = %e, "cannot release resource lock");
            }
        }
    }

    fn try_session_lock(&self) -> Result<bool, LockError> {
        match self.session().as_mut() {
            Some(lock) if lock.is_held() => Ok(true),
            Some(lock) => lock.acquire(false, LockWait::Immediate),
            None => Ok(true),
        }
    }

    /// Take the session lock back shared, polling until the wait bound.
    ///
    /// Returns whether the lock is held afterwards. Without a session (no
    /// successful startup) there is nothing to take and this returns `true`.
    pub async fn reacquire_session_lock(&self) -> bool {
        let deadline = Instant::now() + self.session_wait;
        loop {
            match self.try_session_lock() {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "cannot take the resource lock back");
                    return false;
                }
            }
            if Instant::now() >= deadline {
                tracing::warn!(
                    wait_ms = self.session_wait.as_millis() as u64,
                    "resource lock still busy after operation"
                );
                return false;
            }
            tokio::time::sleep(SESSION_LOCK_POLL).await;
        }
    }

    /// The daemon this coordinator talks to.
    pub fn daemon(&self) -> &Arc<dyn DaemonService> {
        &self.daemon
    }

    /// Check whether this client may start, and in which mode.
    ///
    /// `lock` is the resource lock to take in shared mode. A post-acquire
    /// hook clearing the live repository caches is installed on it. On
    /// success the coordinator keeps the lock for the session; on error it is
    /// dropped, which releases it.
    pub async fn reconcile_startup(
        &self,
        mut lock: ResourceLock,
    ) -> Result<StartupState, StartupError> {
        if !self.policy.is_authorized() {
            return Err(StartupError::Unauthorized);
        }

        if !self.daemon.service_available().await {
            return Err(StartupError::ServiceUnavailable);
        }

        let supported = self.daemon.supported_apis();
        let api = self.daemon.api().await.map_err(|e| {
            tracing::debug!(error = %e, "cannot read daemon API");
            StartupError::ServiceUnavailable
        })?;
        if !supported.contains(&api) {
            return Err(StartupError::ApiMismatch {
                daemon: api,
                supported,
            });
        }

        let registry = Arc::clone(&self.registry);
        lock.add_post_acquire_hook(Arc::new(move |mode: LockMode| {
            tracing::debug!(%mode, "resource lock acquired, clearing live caches");
            clear_live_caches(registry.as_ref());
        }));

        let acquired = lock
            .acquire(false, LockWait::Immediate)
            .map_err(|e| StartupError::Lock(e.to_string()))?;

        // The exclusive check races with the daemon; a wrong answer ends in
        // a startup error, which is acceptable.
        let degraded = if acquired {
            false
        } else {
            match self.daemon.is_exclusive().await {
                Ok(true) => true,
                Ok(false) => return Err(StartupError::AnotherManagerActive),
                Err(e) => {
                    tracing::debug!(error = %e, "cannot query exclusive mode");
                    return Err(StartupError::AnotherManagerActive);
                }
            }
        };

        let activity = self.daemon.activity().await.map_err(|e| {
            tracing::debug!(error = %e, "cannot read daemon activity");
            StartupError::DaemonNotAvailable
        })?;
        tracing::debug!(%activity, degraded, "daemon activity at startup");

        let attached = match activity {
            DaemonActivity::Available if degraded => {
                return Err(StartupError::ExclusiveUnavailable)
            }
            DaemonActivity::Available => None,
            DaemonActivity::NotAvailable => return Err(StartupError::DaemonNotAvailable),
            DaemonActivity::UpdatingRepositories
            | DaemonActivity::ManagingApplications
            | DaemonActivity::UpgradingSystem => Some(self.attach(activity)),
            DaemonActivity::InternalRoutines => return Err(StartupError::DaemonBusy),
            DaemonActivity::Unknown(code) => return Err(StartupError::DaemonIncompatible(code)),
        };

        *self.session() = Some(lock);
        Ok(StartupState {
            degraded,
            activity,
            attached,
        })
    }

    /// Follow an operation already running in the daemon.
    ///
    /// Local activity is claimed before the task is spawned, so the client
    /// is busy from the moment this returns.
    pub fn attach(&self, activity: DaemonActivity) -> JoinHandle<()> {
        let coordinator = self.clone();
        let local = match activity {
            DaemonActivity::UpdatingRepositories => LocalActivity::UpdatingRepositories,
            DaemonActivity::ManagingApplications => LocalActivity::ManagingApplications,
            _ => LocalActivity::UpgradingSystem,
        };
        let guard = self.claim(local);

        tokio::spawn(async move {
            let Ok(guard) = guard else {
                tracing::debug!(%activity, "already following an operation");
                return;
            };
            let result = match local {
                LocalActivity::UpdatingRepositories => {
                    coordinator.run_update(Role::Observer, guard).await
                }
                LocalActivity::ManagingApplications => {
                    coordinator.run_application(None, Role::Observer, guard).await
                }
                _ => coordinator.run_upgrade(Role::Observer, guard).await,
            };
            if let Err(e) = result {
                tracing::warn!(%activity, error = %e, "lost track of daemon operation");
            }
        })
    }

    /// Ask the daemon to update repositories.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::Busy`] when another operation is followed,
    /// [`CoordinatorError::Daemon`] when the daemon cannot be driven.
    pub async fn update_repositories(&self) -> Result<OperationOutcome, CoordinatorError> {
        let guard = self.claim(LocalActivity::UpdatingRepositories)?;
        self.run_update(Role::Initiator, guard).await
    }

    /// Ask the daemon to install or remove one application.
    pub async fn application_request(
        &self,
        request: ApplicationRequest,
    ) -> Result<OperationOutcome, CoordinatorError> {
        let guard = self.claim(LocalActivity::ManagingApplications)?;
        self.run_application(Some(request), Role::Initiator, guard)
            .await
    }

    /// Ask the daemon to upgrade the system.
    pub async fn upgrade_system(&self) -> Result<OperationOutcome, CoordinatorError> {
        let guard = self.claim(LocalActivity::UpgradingSystem)?;
        self.run_upgrade(Role::Initiator, guard).await
    }

    fn claim(&self, activity: LocalActivity) -> Result<ActivityGuard, CoordinatorError> {
        let mut local = self.local();
        if *local != LocalActivity::Ready {
            return Err(CoordinatorError::Busy(*local));
        }
        *local = activity;
        Ok(ActivityGuard {
            local: Arc::clone(&self.local),
        })
    }

    fn notify(&self, event: UiEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("UI loop is gone, dropping event");
        }
    }

    async fn run_update(
        &self,
        role: Role,
        _guard: ActivityGuard,
    ) -> Result<OperationOutcome, CoordinatorError> {
        self.notify(UiEvent::StartWorking {
            state: Some(ViewState::Work),
            lock: true,
        });

        self.release_session_lock();
        let result = self.daemon.begin_repositories_update(role).await;
        let outcome = outcome_or_failure(&result);
        if outcome.success {
            self.cache.clear(self.registry.as_ref());
        }
        self.reacquire_session_lock().await;
        self.notify(UiEvent::RepositoriesUpdated { outcome });
        result.map_err(CoordinatorError::from)
    }

    async fn run_application(
        &self,
        request: Option<ApplicationRequest>,
        role: Role,
        _guard: ActivityGuard,
    ) -> Result<OperationOutcome, CoordinatorError> {
        self.notify(UiEvent::StartWorking {
            state: Some(ViewState::Work),
            lock: false,
        });

        self.release_session_lock();
        let result = self.daemon.begin_application_request(request, role).await;
        self.reacquire_session_lock().await;
        self.notify(UiEvent::ApplicationsManaged {
            outcome: outcome_or_failure(&result),
            activity: LocalActivity::ManagingApplications,
        });
        result.map_err(CoordinatorError::from)
    }

    async fn run_upgrade(
        &self,
        role: Role,
        _guard: ActivityGuard,
    ) -> Result<OperationOutcome, CoordinatorError> {
        self.notify(UiEvent::StartWorking {
            state: Some(ViewState::Work),
            lock: false,
        });

        self.release_session_lock();
        let result = self.daemon.begin_system_upgrade(role).await;
        self.reacquire_session_lock().await;
        self.notify(UiEvent::ApplicationsManaged {
            outcome: outcome_or_failure(&result),
            activity: LocalActivity::UpgradingSystem,
        });
        result.map_err(CoordinatorError::from)
    }
}

fn outcome_or_failure(result: &Result<OperationOutcome, DaemonError>) -> OperationOutcome {
    match result {
        Ok(outcome) => outcome.clone(),
        Err(e) => OperationOutcome::failed(-1, e.to_string()),
    }
}
