//! Network trust resolution for WakeGate.
//!
//! Turns the platform's view of the active network into a
//! [`NetworkContext`](wakegate_core::NetworkContext): transport, tunnel state,
//! link address and a trust label derived from the configured home and work
//! networks.
//!
//! # Core Concepts
//!
//! - **NetworkMonitor**: platform seam (active network snapshot plus capability notifications)
//! - **PushNetworkMonitor**: monitor driven by forwarded platform callbacks
//! - **NetworkContextResolver**: SSID then subnet classification, generation checked

pub mod monitor;
pub mod resolver;

pub use monitor::{
    ActiveNetwork, CapabilityBus, CapabilityListener, CapabilityUpdate, LinkAddress,
    NetworkMonitor, NetworkTransport, PushNetworkMonitor,
};
pub use resolver::{NetworkContextResolver, ResolveError};
