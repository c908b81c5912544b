//! Remote shell transport seam
//!
//! The SSH protocol engine sits behind [`ShellConnector`] and
//! [`ShellSession`]; [`crate::ssh::RusshConnector`] is the production one.
//! This module owns what happens around it: host key policy, identity negotiation, per-stage timeouts and
//! a session guard that disconnects on every exit path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use wakegate_core::{ErrorKind, TimeoutConfig};
use wakegate_identity::{BridgeError, IdentityBridge, ShellIdentity};

/// Shell transport errors
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Host key mismatch: expected {expected}, presented {presented}")]
    HostKeyMismatch { expected: String, presented: String },

    /// Local identity could not take part in authentication
    #[error("Identity error: {0}")]
    Identity(#[from] BridgeError),

    /// Remote side refused the public key
    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Timed out during {stage} after {elapsed:?}")]
    Timeout {
        stage: &'static str,
        elapsed: Duration,
    },
}

impl ShellError {
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            ShellError::Identity(err) => err.error_kind(),
            ShellError::Timeout { .. } => ErrorKind::Timeout,
            ShellError::Connect(_)
            | ShellError::HostKeyMismatch { .. }
            | ShellError::AuthRejected(_)
            | ShellError::Channel(_) => ErrorKind::TransportError,
        }
    }
}

/// Host identity verification policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyPolicy {
    /// Accept whatever host key is presented
    AcceptAny,
    /// Require the given `SHA256:` fingerprint
    Pinned(String),
}

impl HostKeyPolicy {
    pub fn from_fingerprint(fingerprint: Option<&str>) -> Self {
        match fingerprint {
            Some(fp) => HostKeyPolicy::Pinned(fp.to_string()),
            None => HostKeyPolicy::AcceptAny,
        }
    }

    pub fn check(&self, presented: Option<&str>) -> Result<(), ShellError> {
        match self {
            HostKeyPolicy::AcceptAny => Ok(()),
            HostKeyPolicy::Pinned(expected) if presented == Some(expected.as_str()) => Ok(()),
            HostKeyPolicy::Pinned(expected) => Err(ShellError::HostKeyMismatch {
                expected: expected.clone(),
                presented: presented.unwrap_or("<none>").to_string(),
            }),
        }
    }
}

/// Where and as whom to open a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
}

/// Result of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_status: Option<u32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn succeeded(&self) -> bool {
        matches!(self.exit_status, None | Some(0))
    }
}

/// Opens transport-level sessions.
#[async_trait]
pub trait ShellConnector: Send + Sync {
    async fn connect(&self, target: &ShellTarget) -> Result<Box<dyn ShellSession>, ShellError>;
}

/// One single-use SSH session.
#[async_trait]
pub trait ShellSession: Send {
    /// Fingerprint of the host key presented during key exchange
    fn host_key_fingerprint(&self) -> Option<&str>;

    /// Signature schemes the server accepts for public-key auth, if it advertised any
    fn server_signature_algorithms(&self) -> Vec<String> {
        Vec::new()
    }

    async fn authenticate(
        &mut self,
        username: &str,
        identity: &dyn ShellIdentity,
    ) -> Result<(), ShellError>;

    async fn exec(&mut self, command: &str) -> Result<CommandOutput, ShellError>;

    /// Close the session. Must be safe to call on a half-open session.
    async fn disconnect(&mut self);
}

/// Owns a session and disconnects it exactly once.
///
/// Call [`SessionGuard::close`] on normal paths. If the guard is dropped
/// without closing (cancelled task, panic), disconnect is spawned on the
/// current runtime.
pub struct SessionGuard {
    session: Option<Box<dyn ShellSession>>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn ShellSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    fn session(&mut self) -> Result<&mut (dyn ShellSession + 'static), ShellError> {
        self.session
            .as_deref_mut()
            .ok_or_else(|| ShellError::Channel("session already closed".into()))
    }

    pub async fn close(mut self) {
        if let Some(mut session) = self.session.take() {
            session.disconnect().await;
            debug!("shell session closed");
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move { session.disconnect().await });
                }
                Err(_) => warn!("shell session dropped outside a runtime; disconnect skipped"),
            }
        }
    }
}

/// Runs one command over a fresh authenticated session.
pub struct ShellExecutor<'a> {
    connector: &'a dyn ShellConnector,
    timeouts: &'a TimeoutConfig,
}

impl<'a> ShellExecutor<'a> {
    pub fn new(connector: &'a dyn ShellConnector, timeouts: &'a TimeoutConfig) -> Self {
        Self {
            connector,
            timeouts,
        }
    }

    /// Connect, verify the host, authenticate with `identity`, run `command`.
    ///
    /// The session is disconnected before this returns, whatever the result.
    pub async fn run(
        &self,
        target: &ShellTarget,
        policy: &HostKeyPolicy,
        identity: &IdentityBridge,
        command: &str,
    ) -> Result<CommandOutput, ShellError> {
        let connect_timeout = self.timeouts.connect();
        let session = timeout(connect_timeout, self.connector.connect(target))
            .await
            .map_err(|_| ShellError::Timeout {
                stage: "connect",
                elapsed: connect_timeout,
            })??;
        debug!(host = %target.host, port = target.port, "shell session opened");

        let mut guard = SessionGuard::new(session);
        let result = self.drive(&mut guard, target, policy, identity, command).await;

        let close_timeout = self.timeouts.write();
        if timeout(close_timeout, guard.close()).await.is_err() {
            warn!(host = %target.host, timeout = ?close_timeout, "shell session did not close in time, abandoned");
        }
        result
    }

    async fn drive(
        &self,
        guard: &mut SessionGuard,
        target: &ShellTarget,
        policy: &HostKeyPolicy,
        identity: &IdentityBridge,
        command: &str,
    ) -> Result<CommandOutput, ShellError> {
        let session = guard.session()?;
        policy.check(session.host_key_fingerprint())?;

        let offered = session.server_signature_algorithms();
        if !offered.is_empty() {
            identity.negotiate(&offered)?;
        }

        let auth_timeout = self.timeouts.auth();
        timeout(auth_timeout, session.authenticate(&target.username, identity))
            .await
            .map_err(|_| ShellError::Timeout {
                stage: "authentication",
                elapsed: auth_timeout,
            })??;
        info!(host = %target.host, user = %target.username, "shell authentication succeeded");

        let read_timeout = self.timeouts.read();
        timeout(read_timeout, session.exec(command))
            .await
            .map_err(|_| ShellError::Timeout {
                stage: "exec",
                elapsed: read_timeout,
            })?
    }
}
