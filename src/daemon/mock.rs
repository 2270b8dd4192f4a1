//! daemon::mock
//!
//! Mock daemon for deterministic testing.
//!
//! # Design
//!
//! Every answer is configurable, any call can be made to fail, and each
//! call is recorded. Begin operations can be held open with
//! [`MockDaemon::hold_operations`] to observe the client while work is in
//! flight. With [`MockDaemon::with_resource_lock`] the mock takes the
//! resource lock exclusive for each operation, like the real daemon does.
//!
//! # Example
//!
//! ```
//! use pkgfront::daemon::mock::{MockDaemon, DaemonCall};
//! use pkgfront::daemon::{DaemonActivity, DaemonService};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let daemon = MockDaemon::new().with_activity(DaemonActivity::UpgradingSystem);
//! assert_eq!(daemon.activity().await.unwrap(), DaemonActivity::UpgradingSystem);
//! assert_eq!(daemon.calls(), vec![DaemonCall::Activity]);
//! # });
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::traits::{
    ApplicationRequest, DaemonActivity, DaemonError, DaemonService, OperationOutcome, Role,
};
use crate::core::ops::{LockWait, ResourceLock};

/// Default API version spoken by the mock.
pub const MOCK_API: u32 = 4;

/// Which call should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    Api(DaemonError),
    Activity(DaemonError),
    IsExclusive(DaemonError),
    RepositoriesUpdate(DaemonError),
    ApplicationRequest(DaemonError),
    SystemUpgrade(DaemonError),
}

/// Recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonCall {
    ServiceAvailable,
    Api,
    Activity,
    IsExclusive,
    RepositoriesUpdate { role: Role },
    ApplicationRequest {
        request: Option<ApplicationRequest>,
        role: Role,
    },
    SystemUpgrade { role: Role },
}

#[derive(Debug)]
struct MockDaemonInner {
    available: bool,
    supported_apis: Vec<u32>,
    api: u32,
    activity: DaemonActivity,
    exclusive: bool,
    outcome: OperationOutcome,
    fail_on: Option<FailOn>,
    calls: Vec<DaemonCall>,
    gate: Option<Arc<Notify>>,
    resource_lock: Option<PathBuf>,
}

/// Mock daemon.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone)]
pub struct MockDaemon {
    inner: Arc<Mutex<MockDaemonInner>>,
}

impl MockDaemon {
    /// An available, idle daemon speaking [`MOCK_API`].
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockDaemonInner {
                available: true,
                supported_apis: vec![MOCK_API],
                api: MOCK_API,
                activity: DaemonActivity::Available,
                exclusive: false,
                outcome: OperationOutcome::ok(),
                fail_on: None,
                calls: Vec::new(),
                gate: None,
                resource_lock: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockDaemonInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set whether the service answers.
    pub fn with_available(self, available: bool) -> Self {
        self.state().available = available;
        self
    }

    /// Set the daemon API and the client's supported set.
    pub fn with_api(self, api: u32, supported: &[u32]) -> Self {
        {
            let mut state = self.state();
            state.api = api;
            state.supported_apis = supported.to_vec();
        }
        self
    }

    /// Set the reported activity.
    pub fn with_activity(self, activity: DaemonActivity) -> Self {
        self.set_activity(activity);
        self
    }

    /// Set the exclusive flag.
    pub fn with_exclusive(self, exclusive: bool) -> Self {
        self.state().exclusive = exclusive;
        self
    }

    /// Set the outcome returned by begin operations.
    pub fn with_outcome(self, outcome: OperationOutcome) -> Self {
        self.state().outcome = outcome;
        self
    }

    /// Make one call fail.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.state().fail_on = Some(fail_on);
        self
    }

    /// Change the reported activity.
    pub fn set_activity(&self, activity: DaemonActivity) {
        self.state().activity = activity;
    }

    /// Take the resource lock at `path` exclusive for every begin operation.
    ///
    /// An operation that cannot take it finishes unsuccessfully with code 1.
    pub fn with_resource_lock(self, path: &Path) -> Self {
        self.state().resource_lock = Some(path.to_path_buf());
        self
    }

    /// Make begin operations wait until the returned handle is notified.
    pub fn hold_operations(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state().gate = Some(Arc::clone(&gate));
        gate
    }

    /// Recorded calls, oldest first.
    pub fn calls(&self) -> Vec<DaemonCall> {
        self.state().calls.clone()
    }

    /// Clear recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    fn record(&self, call: DaemonCall) {
        self.state().calls.push(call);
    }

    fn check_fail(&self, call: &DaemonCall) -> Result<(), DaemonError> {
        let state = self.state();
        let failure = match (&state.fail_on, call) {
            (Some(FailOn::Api(e)), DaemonCall::Api)
            | (Some(FailOn::Activity(e)), DaemonCall::Activity)
            | (Some(FailOn::IsExclusive(e)), DaemonCall::IsExclusive)
            | (Some(FailOn::RepositoriesUpdate(e)), DaemonCall::RepositoriesUpdate { .. })
            | (Some(FailOn::ApplicationRequest(e)), DaemonCall::ApplicationRequest { .. })
            | (Some(FailOn::SystemUpgrade(e)), DaemonCall::SystemUpgrade { .. }) => Some(e.clone()),
            _ => None,
        };
        failure.map_or(Ok(()), Err)
    }

    async fn run_operation(&self, call: DaemonCall) -> Result<OperationOutcome, DaemonError> {
        self.record(call.clone());
        self.check_fail(&call)?;

        let resource_lock = self.state().resource_lock.clone();
        let _held = match resource_lock {
            Some(path) => {
                let mut lock = ResourceLock::open(&path);
                match lock.acquire(true, LockWait::Immediate) {
                    Ok(true) => Some(lock),
                    Ok(false) => {
                        return Ok(OperationOutcome::failed(
                            1,
                            "daemon could not take the resource lock exclusive",
                        ))
                    }
                    Err(e) => return Err(DaemonError::Rejected(e.to_string())),
                }
            }
            None => None,
        };

        let gate = self.state().gate.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(self.state().outcome.clone())
    }
}

impl Default for MockDaemon {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DaemonService for MockDaemon {
    async fn service_available(&self) -> bool {
        self.record(DaemonCall::ServiceAvailable);
        self.state().available
    }

    fn supported_apis(&self) -> Vec<u32> {
        self.state().supported_apis.clone()
    }

    async fn api(&self) -> Result<u32, DaemonError> {
        self.record(DaemonCall::Api);
        self.check_fail(&DaemonCall::Api)?;
        Ok(self.state().api)
    }

    async fn activity(&self) -> Result<DaemonActivity, DaemonError> {
        self.record(DaemonCall::Activity);
        self.check_fail(&DaemonCall::Activity)?;
        Ok(self.state().activity)
    }

    async fn is_exclusive(&self) -> Result<bool, DaemonError> {
        self.record(DaemonCall::IsExclusive);
        self.check_fail(&DaemonCall::IsExclusive)?;
        Ok(self.state().exclusive)
    }

    async fn begin_repositories_update(&self, role: Role) -> Result<OperationOutcome, DaemonError> {
        self.run_operation(DaemonCall::RepositoriesUpdate { role }).await
    }

    async fn begin_application_request(
        &self,
        request: Option<ApplicationRequest>,
        role: Role,
    ) -> Result<OperationOutcome, DaemonError> {
        self.run_operation(DaemonCall::ApplicationRequest { request, role })
            .await
    }

    async fn begin_system_upgrade(&self, role: Role) -> Result<OperationOutcome, DaemonError> {
        self.run_operation(DaemonCall::SystemUpgrade { role }).await
    }
}
