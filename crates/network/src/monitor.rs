//! Platform network monitor seam.
//!
//! Platforms report the active network as a snapshot and deliver capability
//! changes (which carry the Wi-Fi SSID) asynchronously. Each active network
//! gets a monotonically increasing generation so late notifications for a
//! previous network can be told apart from current ones.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::mpsc;
use tracing::debug;
use wakegate_core::TransportType;

/// Transport flag reported in a network's capability set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkTransport {
    Wifi,
    Cellular,
    Ethernet,
    Vpn,
    Other,
}

/// Address assigned to the active link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkAddress {
    pub address: IpAddr,
    pub prefix_len: u8,
}

impl LinkAddress {
    pub fn v4(address: Ipv4Addr, prefix_len: u8) -> Self {
        Self {
            address: IpAddr::V4(address),
            prefix_len,
        }
    }
}

/// Snapshot of the active network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveNetwork {
    pub generation: u64,
    pub transports: Vec<NetworkTransport>,
    pub link_addresses: Vec<LinkAddress>,
}

impl ActiveNetwork {
    pub fn has_transport(&self, transport: NetworkTransport) -> bool {
        self.transports.contains(&transport)
    }

    /// Underlying link type, ignoring any VPN flag.
    pub fn primary_transport(&self) -> TransportType {
        if self.has_transport(NetworkTransport::Wifi) {
            TransportType::Wifi
        } else if self.has_transport(NetworkTransport::Cellular) {
            TransportType::Cellular
        } else if self.has_transport(NetworkTransport::Ethernet) {
            TransportType::Ethernet
        } else {
            TransportType::Other
        }
    }

    /// First IPv4 address on the link with its prefix length.
    pub fn ipv4_link(&self) -> Option<(Ipv4Addr, u8)> {
        self.link_addresses.iter().find_map(|link| match link.address {
            IpAddr::V4(v4) => Some((v4, link.prefix_len)),
            IpAddr::V6(_) => None,
        })
    }
}

/// Capability change notification for a given network generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityUpdate {
    pub generation: u64,
    pub ssid: Option<String>,
}

impl CapabilityUpdate {
    /// Build an update from a platform SSID string, which may be quoted or a
    /// placeholder when location access is denied.
    pub fn from_raw_ssid(generation: u64, raw: Option<&str>) -> Self {
        let ssid = raw
            .map(|s| s.trim().trim_matches('"').to_string())
            .filter(|s| !s.is_empty() && s != "<unknown ssid>");
        Self { generation, ssid }
    }
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, mpsc::UnboundedSender<CapabilityUpdate>>>,
}

/// Fan-out of capability notifications to registered listeners.
#[derive(Clone, Default)]
pub struct CapabilityBus {
    inner: Arc<BusInner>,
}

impl CapabilityBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `update` to every live listener; returns the delivery count.
    pub fn publish(&self, update: CapabilityUpdate) -> usize {
        let mut listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|_, tx| tx.send(update.clone()).is_ok());
        listeners.len()
    }

    /// Register a listener. Dropping it unregisters.
    pub fn register(&self) -> CapabilityListener {
        self.register_seeded(None)
    }

    /// Register a listener whose first notification is `initial`.
    pub fn register_seeded(&self, initial: Option<CapabilityUpdate>) -> CapabilityListener {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(update) = initial {
            // Receiver is alive, send cannot fail
            let _ = tx.send(update);
        }
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx);
        CapabilityListener {
            id,
            rx,
            bus: Arc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Registered capability callback; unregisters itself on drop.
pub struct CapabilityListener {
    id: u64,
    rx: mpsc::UnboundedReceiver<CapabilityUpdate>,
    bus: Weak<BusInner>,
}

impl CapabilityListener {
    /// Next notification, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<CapabilityUpdate> {
        self.rx.recv().await
    }
}

impl Drop for CapabilityListener {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            inner
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.id);
            debug!(listener = self.id, "capability listener unregistered");
        }
    }
}

/// Source of the active network and its capability notifications.
pub trait NetworkMonitor: Send + Sync {
    /// Current active network, `None` when offline.
    fn active_network(&self) -> Option<ActiveNetwork>;

    /// Register for capability notifications.
    fn register_capability_listener(&self) -> CapabilityListener;
}

/// Monitor fed by platform callbacks.
///
/// The platform layer forwards its connectivity callbacks here; generations
/// are assigned on every network change or loss. The latest capability
/// update of the active network is replayed to listeners registered after
/// it was delivered, the way platform callback registration reports the
/// current capabilities immediately.
#[derive(Default)]
pub struct PushNetworkMonitor {
    active: Mutex<Option<ActiveNetwork>>,
    next_generation: AtomicU64,
    last_update: Mutex<Option<CapabilityUpdate>>,
    bus: CapabilityBus,
}

impl PushNetworkMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active network; returns its generation.
    pub fn network_changed(
        &self,
        transports: Vec<NetworkTransport>,
        link_addresses: Vec<LinkAddress>,
    ) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.clear_last_update();
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(ActiveNetwork {
            generation,
            transports,
            link_addresses,
        });
        debug!(generation, "active network changed");
        generation
    }

    /// Record loss of the active network.
    pub fn network_lost(&self) {
        self.next_generation.fetch_add(1, Ordering::SeqCst);
        self.clear_last_update();
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = None;
        debug!("active network lost");
    }

    /// Forward a capability change for `generation`.
    pub fn capabilities_changed(&self, generation: u64, raw_ssid: Option<&str>) -> usize {
        let update = CapabilityUpdate::from_raw_ssid(generation, raw_ssid);
        // Held across publish so a concurrent registration sees either the
        // replayed update or the live one, never neither
        let mut last = self
            .last_update
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let current = self.next_generation.load(Ordering::SeqCst);
        if generation == current {
            *last = Some(update.clone());
        }
        self.bus.publish(update)
    }

    fn clear_last_update(&self) {
        *self
            .last_update
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn bus(&self) -> &CapabilityBus {
        &self.bus
    }
}

impl NetworkMonitor for PushNetworkMonitor {
    fn active_network(&self) -> Option<ActiveNetwork> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn register_capability_listener(&self) -> CapabilityListener {
        let last = self
            .last_update
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.bus.register_seeded(last.clone())
    }
}
