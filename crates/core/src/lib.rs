//! Core functionality for the WakeGate remote wake system.
//!
//! This crate provides the data model shared by every stage of the
//! wake pipeline (network context, route decisions, action outcomes),
//! the site table, configuration loading and logging bootstrap.
//!
//! # Pipeline
//!
//! 1. Network context resolved by `wakegate-network`
//! 2. Trust verdict computed by the trust gate
//! 3. Transport and endpoint selected by the transport router
//! 4. Action executed by the command dispatcher, reported as an [`ActionOutcome`]

pub mod config;
pub mod error;
pub mod logging;
pub mod site;
pub mod types;

pub use config::{
    HttpConfig, IdentityConfig, NetworkConfig, TimeoutConfig, TrustedNetwork, TunnelConfig,
    WakeGateConfig, MIN_KEY_SIZE_BITS,
};
pub use error::{ConfigError, CoreError, ErrorKind, Result};
pub use site::{HttpRequestKind, Site, SiteAction, SiteTable, TransportKind};
pub use types::{
    ActionOutcome, NetworkContext, RouteDecision, SubnetPrefix, TransportType, TrustLabel,
};
