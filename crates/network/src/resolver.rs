//! Network trust context resolution.
//!
//! Classification precedence: exact SSID match, then IPv4 subnet match,
//! else `unknown`. Tunnel detection (VPN transport on the active network) is
//! independent of the label and always performed.
//!
//! The SSID only arrives through a capability notification, so on Wi-Fi the
//! resolver waits (bounded) for one before falling back to subnet matching.
//! A resolution whose network generation is no longer active when it
//! completes is discarded and retried.

use std::net::Ipv4Addr;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use wakegate_core::{ErrorKind, NetworkConfig, NetworkContext, TransportType, TrustLabel};

use crate::monitor::{ActiveNetwork, CapabilityListener, NetworkMonitor, NetworkTransport};

/// Resolution failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// Active network kept changing while resolving
    #[error("Active network changed during {attempts} consecutive resolution attempts")]
    Unstable { attempts: u32 },
}

impl ResolveError {
    pub fn error_kind(&self) -> ErrorKind {
        ErrorKind::NetworkUnresolved
    }
}

enum Attempt {
    Resolved(NetworkContext),
    Stale { resolved: u64, current: Option<u64> },
}

/// Classifies the active network into a trust context.
pub struct NetworkContextResolver {
    monitor: Arc<dyn NetworkMonitor>,
    config: NetworkConfig,
}

impl NetworkContextResolver {
    pub fn new(monitor: Arc<dyn NetworkMonitor>, config: NetworkConfig) -> Self {
        Self { monitor, config }
    }

    /// Resolve a fresh context for the current request.
    ///
    /// Cancel by dropping the future; any pending capability listener is
    /// unregistered with it.
    pub async fn resolve(&self) -> Result<NetworkContext, ResolveError> {
        let attempts = self.config.max_generation_retries + 1;
        for attempt in 1..=attempts {
            match self.resolve_once().await {
                Attempt::Resolved(context) => {
                    info!(
                        trust_label = %context.trust_label(),
                        tunnel_active = context.tunnel_active(),
                        generation = context.generation(),
                        "network context resolved"
                    );
                    return Ok(context);
                }
                Attempt::Stale { resolved, current } => {
                    debug!(attempt, resolved, ?current, "discarding stale resolution");
                }
            }
        }
        warn!(attempts, "network did not settle during resolution");
        Err(ResolveError::Unstable { attempts })
    }

    async fn resolve_once(&self) -> Attempt {
        // Register before the snapshot so no notification is missed in between
        let mut listener = self.monitor.register_capability_listener();

        let Some(network) = self.monitor.active_network() else {
            debug!("no active network");
            return Attempt::Resolved(NetworkContext::disconnected());
        };

        let transport = network.primary_transport();
        let tunnel_active = network.has_transport(NetworkTransport::Vpn);
        let link = network.ipv4_link();

        let ssid = if transport == TransportType::Wifi {
            self.await_ssid(&mut listener, network.generation).await
        } else {
            None
        };
        drop(listener);

        let label = self.classify(ssid.as_deref(), link.map(|(addr, _)| addr));

        let current = self.monitor.active_network().map(|n| n.generation);
        if current != Some(network.generation) {
            return Attempt::Stale {
                resolved: network.generation,
                current,
            };
        }

        Attempt::Resolved(build_context(&network, transport, tunnel_active, label))
    }

    async fn await_ssid(&self, listener: &mut CapabilityListener, generation: u64) -> Option<String> {
        let wait = async {
            while let Some(update) = listener.recv().await {
                if update.generation < generation {
                    debug!(
                        stale = update.generation,
                        generation, "ignoring capability update for previous network"
                    );
                    continue;
                }
                if update.generation > generation {
                    // Network replaced; the generation check discards this attempt
                    return None;
                }
                return update.ssid;
            }
            None
        };

        match timeout(self.config.ssid_wait(), wait).await {
            Ok(ssid) => ssid,
            Err(_) => {
                debug!(generation, "no capability notification before timeout, using subnet fallback");
                None
            }
        }
    }

    /// Trust label for an observed SSID and IPv4 address.
    pub fn classify(&self, ssid: Option<&str>, address: Option<Ipv4Addr>) -> TrustLabel {
        let home = &self.config.home;
        let work = &self.config.work;

        if let Some(ssid) = ssid {
            if home.ssid.as_deref() == Some(ssid) {
                return TrustLabel::TrustedLocalA;
            }
            if work.ssid.as_deref() == Some(ssid) {
                return TrustLabel::TrustedLocalB;
            }
        }

        if let Some(address) = address {
            if home.subnet.is_some_and(|s| s.contains(address)) {
                return TrustLabel::TrustedLocalA;
            }
            if work.subnet.is_some_and(|s| s.contains(address)) {
                return TrustLabel::TrustedLocalB;
            }
        }

        TrustLabel::Unknown
    }
}

fn build_context(
    network: &ActiveNetwork,
    transport: TransportType,
    tunnel_active: bool,
    label: TrustLabel,
) -> NetworkContext {
    let context = NetworkContext::new(Some(transport), tunnel_active, label)
        .with_generation(network.generation);
    match network.ipv4_link() {
        Some((address, prefix_len)) => context.with_address(address, Some(prefix_len)),
        None => context,
    }
}
