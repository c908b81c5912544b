//! WakeGate Router - trust gating, routing and dispatch
//!
//! This crate turns a resolved network context into a remote action:
//! - Trust gate deciding whether the current path is acceptable
//! - Deterministic site routing to the local or tunnel endpoint
//! - Command dispatch over a remote shell or an HTTP JSON request
//! - The `WakeGate` facade used by the presentation layer
//!
//! # Architecture
//!
//! Every trigger flows through the following pipeline:
//! 1. Context resolved by `NetworkContextResolver`
//! 2. Path checked by `TrustGate`
//! 3. Endpoint chosen by `TransportRouter`
//! 4. Action executed by `CommandDispatcher`, which signs with the device
//!    identity through `IdentityBridge` when the site speaks shell
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use wakegate_core::WakeGateConfig;
//! use wakegate_identity::SoftwareKeystore;
//! use wakegate_network::PushNetworkMonitor;
//! use wakegate_router::{pipeline::vault_from_config, RusshConnector, WakeGate};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WakeGateConfig::default();
//! let vault = Arc::new(vault_from_config(&config, Arc::new(SoftwareKeystore::new())));
//! let monitor = Arc::new(PushNetworkMonitor::new());
//! let connector = Arc::new(RusshConnector::new(&config.timeouts));
//!
//! let gate = WakeGate::new(&config, monitor, vault, connector)?;
//! gate.ensure_identity()?;
//! let report = gate.trigger("home").await;
//! println!("{}", report.outcome.message);
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod gate;
pub mod http;
pub mod pipeline;
pub mod route;
pub mod shell;
pub mod ssh;

// Re-export commonly used types
pub use dispatcher::{CommandDispatcher, DispatchError};
pub use gate::{GateDecision, TrustGate, TunnelPrompt};
pub use http::{request_url, ExecuteBody, HttpError, HttpTransport, JsonRequest, WolBody};
pub use pipeline::{vault_from_config, PipelineError, TriggerReport, WakeGate};
pub use route::{RouteError, TransportRouter};
pub use shell::{
    CommandOutput, HostKeyPolicy, SessionGuard, ShellConnector, ShellError, ShellExecutor,
    ShellSession, ShellTarget,
};
pub use ssh::RusshConnector;
