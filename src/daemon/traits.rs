//! daemon::traits
//!
//! The privileged daemon as seen from the client.
//!
//! # Design
//!
//! The trait is async because every call crosses a process boundary.
//! Begin operations either start a new daemon operation
//! ([`Role::Initiator`]) or attach to one already in flight
//! ([`Role::Observer`]); both resolve when the daemon reports the
//! operation finished.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from daemon calls.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DaemonError {
    /// The daemon could not be reached.
    #[error("daemon unreachable: {0}")]
    Unreachable(String),

    /// The daemon answered with something unexpected.
    #[error("daemon protocol error: {0}")]
    Protocol(String),

    /// The daemon refused the request.
    #[error("daemon rejected request: {0}")]
    Rejected(String),
}

/// What the daemon is currently doing.
///
/// Decoded from the numeric wire code. Codes this client does not know
/// are kept as [`DaemonActivity::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DaemonActivity {
    Available,
    NotAvailable,
    UpdatingRepositories,
    ManagingApplications,
    UpgradingSystem,
    InternalRoutines,
    Unknown(i32),
}

impl DaemonActivity {
    /// Decode a wire code.
    ///
    /// # Example
    ///
    /// ```
    /// use pkgfront::daemon::DaemonActivity;
    ///
    /// assert_eq!(DaemonActivity::from_code(2), DaemonActivity::UpdatingRepositories);
    /// assert_eq!(DaemonActivity::from_code(99), DaemonActivity::Unknown(99));
    /// ```
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Available,
            1 => Self::NotAvailable,
            2 => Self::UpdatingRepositories,
            3 => Self::ManagingApplications,
            4 => Self::UpgradingSystem,
            5 => Self::InternalRoutines,
            other => Self::Unknown(other),
        }
    }

    /// Encode to the wire code.
    pub fn code(self) -> i32 {
        match self {
            Self::Available => 0,
            Self::NotAvailable => 1,
            Self::UpdatingRepositories => 2,
            Self::ManagingApplications => 3,
            Self::UpgradingSystem => 4,
            Self::InternalRoutines => 5,
            Self::Unknown(code) => code,
        }
    }
}

impl fmt::Display for DaemonActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::NotAvailable => write!(f, "not available"),
            Self::UpdatingRepositories => write!(f, "updating repositories"),
            Self::ManagingApplications => write!(f, "managing applications"),
            Self::UpgradingSystem => write!(f, "upgrading system"),
            Self::InternalRoutines => write!(f, "running internal routines"),
            Self::Unknown(code) => write!(f, "unknown activity {code}"),
        }
    }
}

/// Whether a begin operation starts work or attaches to running work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Initiator,
    Observer,
}

/// Action requested on an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationAction {
    Install,
    Remove,
}

impl fmt::Display for ApplicationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => write!(f, "install"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// Install or remove one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRequest {
    /// Package atom or name
    pub package: String,
    /// What to do with it
    pub action: ApplicationAction,
}

/// How a daemon operation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    /// Whether the operation succeeded
    pub success: bool,
    /// Daemon exit code (0 on success)
    pub code: i32,
    /// Message for the operator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl OperationOutcome {
    /// Successful outcome.
    pub fn ok() -> Self {
        Self {
            success: true,
            code: 0,
            message: None,
        }
    }

    /// Failed outcome with an exit code and message.
    pub fn failed(code: i32, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code,
            message: Some(message.into()),
        }
    }
}

/// The privileged daemon.
///
/// # Example
///
/// ```
/// use pkgfront::daemon::{DaemonService, Role};
/// use pkgfront::daemon::mock::MockDaemon;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let daemon = MockDaemon::new();
/// assert!(daemon.service_available().await);
/// let outcome = daemon.begin_repositories_update(Role::Initiator).await.unwrap();
/// assert!(outcome.success);
/// # });
/// ```
#[async_trait]
pub trait DaemonService: Send + Sync {
    /// Whether the daemon answers at all.
    async fn service_available(&self) -> bool;

    /// API versions this client can talk to.
    fn supported_apis(&self) -> Vec<u32>;

    /// API version the daemon speaks.
    async fn api(&self) -> Result<u32, DaemonError>;

    /// Current daemon activity.
    async fn activity(&self) -> Result<DaemonActivity, DaemonError>;

    /// Whether the daemon holds the resource lock exclusively.
    async fn is_exclusive(&self) -> Result<bool, DaemonError>;

    /// Start, or attach to, a repositories update.
    async fn begin_repositories_update(&self, role: Role) -> Result<OperationOutcome, DaemonError>;

    /// Start, or attach to, an application request.
    ///
    /// Observers pass `None`; they follow whatever request is in flight.
    async fn begin_application_request(
        &self,
        request: Option<ApplicationRequest>,
        role: Role,
    ) -> Result<OperationOutcome, DaemonError>;

    /// Start, or attach to, a system upgrade.
    async fn begin_system_upgrade(&self, role: Role) -> Result<OperationOutcome, DaemonError>;
}
