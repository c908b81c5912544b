//! Command dispatcher for site actions
//!
//! Executes a routed action end to end over the site's transport and folds
//! every result into a single [`ActionOutcome`]. Failures are reported, never
//! retried here; the caller re-runs the pipeline if it wants another attempt.

#![warn(missing_docs)]

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use wakegate_core::{
    ActionOutcome, ErrorKind, HttpConfig, RouteDecision, Site, SiteAction, TimeoutConfig,
};
use wakegate_identity::{IdentityBridge, KeyVault};

use crate::http::{HttpError, HttpTransport, JsonRequest};
use crate::shell::{CommandOutput, HostKeyPolicy, ShellConnector, ShellError, ShellExecutor, ShellTarget};

/// Dispatcher errors
///
/// Internal to the dispatch boundary; callers only ever see the
/// [`ActionOutcome`] these are converted into.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Route was computed for a different site or transport
    #[error("Route does not match site {site_id}: {reason}")]
    RouteMismatch {
        /// Site the dispatch was requested for
        site_id: String,
        /// What did not match
        reason: String,
    },

    /// Identity could not be attached to the shell session
    #[error("Identity unavailable: {0}")]
    Identity(#[from] wakegate_identity::BridgeError),

    /// Shell transport failure
    #[error(transparent)]
    Shell(#[from] ShellError),

    /// HTTP transport failure
    #[error(transparent)]
    Http(#[from] HttpError),
}

impl DispatchError {
    /// Taxonomy kind reported in the outcome
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            DispatchError::RouteMismatch { .. } => ErrorKind::Configuration,
            DispatchError::Identity(err) => err.error_kind(),
            DispatchError::Shell(err) => err.error_kind(),
            DispatchError::Http(err) => err.error_kind(),
        }
    }

    fn into_outcome(self) -> ActionOutcome {
        match self {
            DispatchError::Http(HttpError::Status { status, body }) => {
                let message = if body.trim().is_empty() {
                    format!("Error: {status}")
                } else {
                    format!("Error: {status}: {}", body.trim())
                };
                ActionOutcome::rejected(i32::from(status), message)
            }
            other => ActionOutcome::failure(other.error_kind(), other.to_string()),
        }
    }
}

/// Command dispatcher for shell and HTTP JSON sites
pub struct CommandDispatcher {
    /// Platform SSH engine
    connector: Arc<dyn ShellConnector>,
    /// Shared HTTP client
    http: HttpTransport,
    /// Device identity used for shell authentication
    vault: Arc<KeyVault>,
    /// Identity alias inside the vault
    alias: String,
    /// Per-stage bounds
    timeouts: TimeoutConfig,
}

impl CommandDispatcher {
    /// Create a dispatcher
    pub fn new(
        connector: Arc<dyn ShellConnector>,
        vault: Arc<KeyVault>,
        alias: impl Into<String>,
        timeouts: TimeoutConfig,
        http: &HttpConfig,
    ) -> Result<Self, HttpError> {
        Ok(Self {
            connector,
            http: HttpTransport::new(&timeouts, http)?,
            vault,
            alias: alias.into(),
            timeouts,
        })
    }

    /// Dispatch the site's action along `route`
    ///
    /// Always produces exactly one outcome.
    pub async fn dispatch(&self, site: &Site, route: &RouteDecision) -> ActionOutcome {
        info!(
            site = %site.id,
            endpoint = %route.target_endpoint,
            via_tunnel = route.via_tunnel,
            trust_label = %route.reason,
            "dispatching action"
        );

        let outcome = match self.try_dispatch(site, route).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(site = %site.id, error = %err, kind = %err.error_kind(), "dispatch failed");
                err.into_outcome()
            }
        };

        info!(site = %site.id, succeeded = outcome.succeeded, "dispatch finished");
        outcome
    }

    async fn try_dispatch(
        &self,
        site: &Site,
        route: &RouteDecision,
    ) -> Result<ActionOutcome, DispatchError> {
        if route.site_id != site.id {
            return Err(DispatchError::RouteMismatch {
                site_id: site.id.clone(),
                reason: format!("route computed for '{}'", route.site_id),
            });
        }
        if route.transport_kind != site.transport_kind() {
            return Err(DispatchError::RouteMismatch {
                site_id: site.id.clone(),
                reason: format!("route transport {:?}", route.transport_kind),
            });
        }

        match &site.action {
            SiteAction::Shell {
                username,
                command,
                port,
                host_key_fingerprint,
            } => {
                let target = ShellTarget {
                    host: route.target_endpoint.clone(),
                    port: *port,
                    username: username.clone(),
                };
                let policy = HostKeyPolicy::from_fingerprint(host_key_fingerprint.as_deref());
                self.dispatch_shell(&target, &policy, command).await
            }
            SiteAction::HttpJson { request } => {
                let request = JsonRequest::for_site(site, request)?;
                let body = self.http.post(&route.target_endpoint, &request).await?;
                Ok(ActionOutcome::success(body))
            }
        }
    }

    async fn dispatch_shell(
        &self,
        target: &ShellTarget,
        policy: &HostKeyPolicy,
        command: &str,
    ) -> Result<ActionOutcome, DispatchError> {
        let identity = IdentityBridge::new(Arc::clone(&self.vault), &self.alias)?;
        let output = ShellExecutor::new(self.connector.as_ref(), &self.timeouts)
            .run(target, policy, &identity, command)
            .await?;
        Ok(shell_outcome(output))
    }
}

fn shell_outcome(output: CommandOutput) -> ActionOutcome {
    let stdout = output.stdout.trim();
    match output.exit_status {
        Some(code) if code != 0 => {
            let detail = if output.stderr.trim().is_empty() {
                stdout
            } else {
                output.stderr.trim()
            };
            ActionOutcome::rejected(
                i32::try_from(code).unwrap_or(i32::MAX),
                format!("Command exited with {code}: {detail}"),
            )
        }
        _ if stdout.is_empty() => ActionOutcome::success("Command executed"),
        _ => ActionOutcome::success(stdout),
    }
}
