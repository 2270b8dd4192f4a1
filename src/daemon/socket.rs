//! daemon::socket
//!
//! Daemon client over a Unix stream socket.
//!
//! # Protocol
//!
//! Line-delimited JSON. Each call opens a connection and writes one
//! [`Request`] line. Queries read one [`Response`] line within the query
//! timeout. Begin operations read `progress` lines until a `finished` line
//! arrives, however long the operation takes.
//!
//! ```text
//! -> {"method":"activity"}
//! <- {"type":"activity","code":0}
//!
//! -> {"method":"update_repositories","role":"observer"}
//! <- {"type":"progress","message":"fetching main"}
//! <- {"type":"finished","outcome":{"success":true,"code":0}}
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::OwnedReadHalf;
use tokio::net::UnixStream;

use super::traits::{
    ApplicationRequest, DaemonActivity, DaemonError, DaemonService, OperationOutcome, Role,
};

/// API versions this client implements.
pub const SUPPORTED_APIS: &[u32] = &[3, 4];

/// Default bound for a single-answer query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// One request line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Request {
    Ping,
    Api,
    Activity,
    Exclusive,
    UpdateRepositories {
        role: Role,
    },
    ApplicationRequest {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request: Option<ApplicationRequest>,
        role: Role,
    },
    UpgradeSystem {
        role: Role,
    },
}

/// One response line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Pong,
    Api { version: u32 },
    Activity { code: i32 },
    Exclusive { exclusive: bool },
    Progress { message: String },
    Finished { outcome: OperationOutcome },
    Error { message: String },
}

/// Daemon reached through a Unix socket.
#[derive(Debug, Clone)]
pub struct SocketDaemon {
    socket: PathBuf,
    connect_timeout: Duration,
    query_timeout: Duration,
}

impl SocketDaemon {
    /// Client for the daemon listening on `socket`.
    pub fn new(socket: impl Into<PathBuf>, connect_timeout: Duration) -> Self {
        Self {
            socket: socket.into(),
            connect_timeout,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Bound the time a query may wait for its answer.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Socket path.
    pub fn socket(&self) -> &Path {
        &self.socket
    }

    async fn send(&self, request: &Request) -> Result<Lines<BufReader<OwnedReadHalf>>, DaemonError> {
        let connect = UnixStream::connect(&self.socket);
        let stream = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| {
                DaemonError::Unreachable(format!(
                    "timed out connecting to {}",
                    self.socket.display()
                ))
            })?
            .map_err(|e| {
                DaemonError::Unreachable(format!("{}: {}", self.socket.display(), e))
            })?;

        let (read, mut write) = stream.into_split();

        let mut line = serde_json::to_string(request)
            .map_err(|e| DaemonError::Protocol(format!("cannot encode request: {e}")))?;
        line.push('\n');
        write
            .write_all(line.as_bytes())
            .await
            .map_err(|e| DaemonError::Unreachable(format!("write failed: {e}")))?;
        write
            .flush()
            .await
            .map_err(|e| DaemonError::Unreachable(format!("write failed: {e}")))?;

        Ok(BufReader::new(read).lines())
    }

    async fn next_response(
        lines: &mut Lines<BufReader<OwnedReadHalf>>,
    ) -> Result<Response, DaemonError> {
        let line = lines
            .next_line()
            .await
            .map_err(|e| DaemonError::Unreachable(format!("read failed: {e}")))?
            .ok_or_else(|| DaemonError::Protocol("connection closed".to_string()))?;

        let response: Response = serde_json::from_str(&line)
            .map_err(|e| DaemonError::Protocol(format!("bad response '{line}': {e}")))?;

        if let Response::Error { message } = response {
            return Err(DaemonError::Rejected(message));
        }
        Ok(response)
    }

    async fn query(&self, request: Request) -> Result<Response, DaemonError> {
        let exchange = async {
            let mut lines = self.send(&request).await?;
            Self::next_response(&mut lines).await
        };
        tokio::time::timeout(self.query_timeout, exchange)
            .await
            .map_err(|_| {
                DaemonError::Unreachable(format!(
                    "no answer from {} within {}ms",
                    self.socket.display(),
                    self.query_timeout.as_millis()
                ))
            })?
    }

    async fn follow(&self, request: Request) -> Result<OperationOutcome, DaemonError> {
        let mut lines = self.send(&request).await?;
        loop {
            match Self::next_response(&mut lines).await? {
                Response::Progress { message } => {
                    tracing::info!(target: "pkgfront::daemon", "{message}");
                }
                Response::Finished { outcome } => return Ok(outcome),
                other => {
                    return Err(DaemonError::Protocol(format!(
                        "unexpected response {other:?}"
                    )))
                }
            }
        }
    }
}

fn unexpected(response: Response) -> DaemonError {
    DaemonError::Protocol(format!("unexpected response {response:?}"))
}

#[async_trait]
impl DaemonService for SocketDaemon {
    async fn service_available(&self) -> bool {
        match self.query(Request::Ping).await {
            Ok(Response::Pong) => true,
            Ok(other) => {
                tracing::debug!(response = ?other, "unexpected ping answer");
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, "daemon not available");
                false
            }
        }
    }

    fn supported_apis(&self) -> Vec<u32> {
        SUPPORTED_APIS.to_vec()
    }

    async fn api(&self) -> Result<u32, DaemonError> {
        match self.query(Request::Api).await? {
            Response::Api { version } => Ok(version),
            other => Err(unexpected(other)),
        }
    }

    async fn activity(&self) -> Result<DaemonActivity, DaemonError> {
        match self.query(Request::Activity).await? {
            Response::Activity { code } => Ok(DaemonActivity::from_code(code)),
            other => Err(unexpected(other)),
        }
    }

    async fn is_exclusive(&self) -> Result<bool, DaemonError> {
        match self.query(Request::Exclusive).await? {
            Response::Exclusive { exclusive } => Ok(exclusive),
            other => Err(unexpected(other)),
        }
    }

    async fn begin_repositories_update(&self, role: Role) -> Result<OperationOutcome, DaemonError> {
        self.follow(Request::UpdateRepositories { role }).await
    }

    async fn begin_application_request(
        &self,
        request: Option<ApplicationRequest>,
        role: Role,
    ) -> Result<OperationOutcome, DaemonError> {
        self.follow(Request::ApplicationRequest { request, role })
            .await
    }

    async fn begin_system_upgrade(&self, role: Role) -> Result<OperationOutcome, DaemonError> {
        self.follow(Request::UpgradeSystem { role }).await
    }
}
