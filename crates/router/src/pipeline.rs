//! WakeGate pipeline facade
//!
//! The presentation layer talks to [`WakeGate`] only. Each trigger runs
//! resolve → gate → route → dispatch against a freshly resolved context;
//! nothing is cached between requests.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{info, warn};
use wakegate_core::{
    ActionOutcome, ConfigError, ErrorKind, NetworkContext, WakeGateConfig,
};
use wakegate_identity::{HardwareKeystore, Identity, KeySpec, KeyVault, VaultResult};
use wakegate_network::{NetworkContextResolver, NetworkMonitor, ResolveError};

use crate::dispatcher::CommandDispatcher;
use crate::gate::{GateDecision, TrustGate, TunnelPrompt};
use crate::http::HttpError;
use crate::route::TransportRouter;
use crate::shell::ShellConnector;

/// Errors building the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Http(#[from] HttpError),
}

impl PipelineError {
    pub fn error_kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

/// Result of one full trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerReport {
    /// Context the decision was made on, if resolution succeeded
    pub context: Option<NetworkContext>,
    pub outcome: ActionOutcome,
    /// Set when the user has to activate the tunnel before retrying
    pub tunnel_prompt: Option<TunnelPrompt>,
}

/// Build the identity vault described by `config` over `keystore`.
pub fn vault_from_config(config: &WakeGateConfig, keystore: Arc<dyn HardwareKeystore>) -> KeyVault {
    KeyVault::new(
        keystore,
        KeySpec::signing(config.identity.key_size_bits),
        config.identity.comment.clone(),
    )
}

/// Entry point for the presentation layer.
pub struct WakeGate {
    resolver: NetworkContextResolver,
    gate: TrustGate,
    router: TransportRouter,
    dispatcher: CommandDispatcher,
    vault: Arc<KeyVault>,
    alias: String,
}

impl WakeGate {
    pub fn new(
        config: &WakeGateConfig,
        monitor: Arc<dyn NetworkMonitor>,
        vault: Arc<KeyVault>,
        connector: Arc<dyn ShellConnector>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let alias = config.identity.alias.clone();
        Ok(Self {
            resolver: NetworkContextResolver::new(monitor, config.network.clone()),
            gate: TrustGate::new(&config.tunnel),
            router: TransportRouter::new(config.site_table()?),
            dispatcher: CommandDispatcher::new(
                connector,
                Arc::clone(&vault),
                alias.clone(),
                config.timeouts.clone(),
                &config.http,
            )?,
            vault,
            alias,
        })
    }

    pub async fn resolve_network_context(&self) -> Result<NetworkContext, ResolveError> {
        self.resolver.resolve().await
    }

    pub fn evaluate_trust(&self, context: &NetworkContext) -> GateDecision {
        self.gate.evaluate(context)
    }

    pub fn tunnel_prompt(&self) -> &TunnelPrompt {
        self.gate.tunnel_prompt()
    }

    /// Create the device identity on first use.
    pub fn ensure_identity(&self) -> VaultResult<Identity> {
        self.vault.ensure_identity(&self.alias)
    }

    /// Single-line `ssh-rsa <base64> <comment>` text for authorized_keys.
    pub fn public_key_text(&self) -> VaultResult<String> {
        Ok(self.vault.public_key(&self.alias)?.text().to_string())
    }

    /// Human-readable summary of a freshly resolved context.
    pub async fn network_summary(&self) -> String {
        match self.resolve_network_context().await {
            Ok(context) => context.summary(),
            Err(err) => err.to_string(),
        }
    }

    pub fn router(&self) -> &TransportRouter {
        &self.router
    }

    /// Gate, route and dispatch `site_id` under an already resolved context.
    ///
    /// The dispatcher is only reached when the gate returns `Proceed`.
    pub async fn dispatch(&self, site_id: &str, context: &NetworkContext) -> ActionOutcome {
        if !self.evaluate_trust(context).is_proceed() {
            return blocked_outcome(context);
        }

        let site = match self.router.site(site_id) {
            Ok(site) => site,
            Err(err) => return ActionOutcome::failure(err.error_kind(), err.to_string()),
        };
        match self.router.route(site_id, context) {
            Ok(route) => self.dispatcher.dispatch(site, &route).await,
            Err(err) => ActionOutcome::failure(err.error_kind(), err.to_string()),
        }
    }

    /// Run the whole pipeline for `site_id` against a fresh context.
    pub async fn trigger(&self, site_id: &str) -> TriggerReport {
        let context = match self.resolve_network_context().await {
            Ok(context) => context,
            Err(err) => {
                warn!(site = site_id, error = %err, "network context unresolved");
                return TriggerReport {
                    context: None,
                    outcome: ActionOutcome::failure(err.error_kind(), err.to_string()),
                    tunnel_prompt: None,
                };
            }
        };

        let decision = self.evaluate_trust(&context);
        info!(site = site_id, trust_label = %context.trust_label(), ?decision, "trigger evaluated");

        let tunnel_prompt = match decision {
            GateDecision::RequireTunnel if context.is_connected() => {
                Some(self.gate.tunnel_prompt().clone())
            }
            _ => None,
        };
        let outcome = self.dispatch(site_id, &context).await;

        TriggerReport {
            context: Some(context),
            outcome,
            tunnel_prompt,
        }
    }

    /// Run [`trigger`](Self::trigger) on a background task.
    ///
    /// The receiver yields exactly one report. Dropping it abandons the
    /// request: the trigger is cancelled wherever it is, which unregisters
    /// any pending capability listener and disconnects an open session.
    pub fn spawn_dispatch(self: &Arc<Self>, site_id: impl Into<String>) -> oneshot::Receiver<TriggerReport> {
        let (mut tx, rx) = oneshot::channel();
        let gate = Arc::clone(self);
        let site_id = site_id.into();
        tokio::spawn(async move {
            let report = tokio::select! {
                report = gate.trigger(&site_id) => report,
                _ = tx.closed() => {
                    info!(site = %site_id, "trigger abandoned by caller, cancelled");
                    return;
                }
            };
            if tx.send(report).is_err() {
                warn!(site = %site_id, "trigger result dropped; receiver gone");
            }
        });
        rx
    }
}

fn blocked_outcome(context: &NetworkContext) -> ActionOutcome {
    if context.is_connected() {
        ActionOutcome::failure(
            ErrorKind::RequireTunnel,
            "Untrusted network: activate the tunnel and try again",
        )
    } else {
        ActionOutcome::failure(ErrorKind::NetworkUnresolved, "No active network")
    }
}
