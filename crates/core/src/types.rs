//! Core types
//!
//! Values produced by one pipeline stage and consumed by the next. None of
//! them are mutated after construction; a new resolution produces a new
//! [`NetworkContext`], a new routing produces a new [`RouteDecision`].

use crate::error::{ConfigError, ErrorKind};
use crate::site::TransportKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Primary link transport of the active network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    Wifi,
    Cellular,
    Ethernet,
    Other,
}

impl TransportType {
    /// Label used in the network summary.
    pub fn display_name(&self) -> &'static str {
        match self {
            TransportType::Wifi => "Wi-Fi",
            TransportType::Cellular => "Cellular",
            TransportType::Ethernet => "Ethernet",
            TransportType::Other => "Other",
        }
    }
}

/// Trust classification of the current network path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrustLabel {
    /// Home network (matched by SSID or subnet)
    TrustedLocalA,
    /// Work network (matched by SSID or subnet)
    TrustedLocalB,
    /// Path secured by an active tunnel
    Tunnel,
    Unknown,
}

impl TrustLabel {
    pub const ALL: [TrustLabel; 4] = [
        TrustLabel::TrustedLocalA,
        TrustLabel::TrustedLocalB,
        TrustLabel::Tunnel,
        TrustLabel::Unknown,
    ];

    /// Whether the label denotes one of the configured local networks.
    pub fn is_trusted_local(&self) -> bool {
        matches!(self, TrustLabel::TrustedLocalA | TrustLabel::TrustedLocalB)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrustLabel::TrustedLocalA => "trusted-local-A",
            TrustLabel::TrustedLocalB => "trusted-local-B",
            TrustLabel::Tunnel => "tunnel",
            TrustLabel::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TrustLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// IPv4 network prefix used for subnet trust matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubnetPrefix {
    network: Ipv4Addr,
    prefix_len: u8,
}

impl SubnetPrefix {
    /// Create a prefix, masking off host bits of `network`.
    pub fn new(network: Ipv4Addr, prefix_len: u8) -> Result<Self, ConfigError> {
        if prefix_len > 32 {
            return Err(ConfigError::InvalidSubnet(format!("{network}/{prefix_len}")));
        }
        let masked = u32::from(network) & Self::mask(prefix_len);
        Ok(Self {
            network: Ipv4Addr::from(masked),
            prefix_len,
        })
    }

    fn mask(prefix_len: u8) -> u32 {
        if prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix_len))
        }
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Check whether `addr` falls inside this prefix.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & Self::mask(self.prefix_len) == u32::from(self.network)
    }
}

impl FromStr for SubnetPrefix {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidSubnet(s.to_string());
        let trimmed = s.trim();

        if let Some((addr, len)) = trimmed.split_once('/') {
            let network: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
            let prefix_len: u8 = len.parse().map_err(|_| invalid())?;
            return Self::new(network, prefix_len);
        }

        // Dotted prefix form ("10.0.0." or "10.0"), octet aligned
        let octets: Vec<&str> = trimmed.trim_end_matches('.').split('.').collect();
        if octets.is_empty() || octets.len() > 4 || octets.iter().any(|o| o.is_empty()) {
            return Err(invalid());
        }
        let mut bytes = [0u8; 4];
        for (slot, octet) in bytes.iter_mut().zip(&octets) {
            *slot = octet.parse().map_err(|_| invalid())?;
        }
        Self::new(Ipv4Addr::from(bytes), (octets.len() * 8) as u8)
    }
}

impl TryFrom<String> for SubnetPrefix {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SubnetPrefix> for String {
    fn from(value: SubnetPrefix) -> Self {
        value.to_string()
    }
}

impl fmt::Display for SubnetPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

/// Snapshot of the device's trust context for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkContext {
    transport: Option<TransportType>,
    tunnel_active: bool,
    local_address: Option<Ipv4Addr>,
    subnet_prefix_length: Option<u8>,
    trust_label: TrustLabel,
    generation: u64,
}

impl NetworkContext {
    pub fn new(transport: Option<TransportType>, tunnel_active: bool, trust_label: TrustLabel) -> Self {
        Self {
            transport,
            tunnel_active,
            local_address: None,
            subnet_prefix_length: None,
            trust_label,
            generation: 0,
        }
    }

    /// Context reported when the device has no active network.
    pub fn disconnected() -> Self {
        Self::new(None, false, TrustLabel::Unknown)
    }

    /// Attach the IPv4 link address the context was derived from.
    pub fn with_address(self, address: Ipv4Addr, prefix_length: Option<u8>) -> Self {
        Self {
            local_address: Some(address),
            subnet_prefix_length: prefix_length,
            ..self
        }
    }

    /// Attach the network generation the context was resolved against.
    pub fn with_generation(self, generation: u64) -> Self {
        Self { generation, ..self }
    }

    pub fn transport(&self) -> Option<TransportType> {
        self.transport
    }

    pub fn tunnel_active(&self) -> bool {
        self.tunnel_active
    }

    pub fn local_address(&self) -> Option<Ipv4Addr> {
        self.local_address
    }

    pub fn subnet_prefix_length(&self) -> Option<u8> {
        self.subnet_prefix_length
    }

    pub fn trust_label(&self) -> TrustLabel {
        self.trust_label
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether any network was active when the context was resolved.
    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Human-readable description for display.
    pub fn summary(&self) -> String {
        let Some(transport) = self.transport else {
            return "No active network".to_string();
        };

        let address = self
            .local_address
            .map(|a| a.to_string())
            .unwrap_or_else(|| "Unknown IP".to_string());
        let mask = self
            .subnet_prefix_length
            .map(|p| format!("/{p}"))
            .unwrap_or_else(|| "Unknown".to_string());

        format!(
            "Connection Type: {}\nIP Address: {}\nSubnet Mask: {}\nTunnel: {}\nTrust: {}",
            transport.display_name(),
            address,
            mask,
            if self.tunnel_active { "active" } else { "inactive" },
            self.trust_label,
        )
    }
}

/// Transport and endpoint chosen for one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub site_id: String,
    pub transport_kind: TransportKind,
    pub target_endpoint: String,
    /// Trust label the decision was derived from
    pub reason: TrustLabel,
    /// Whether the tunnel endpoint was selected
    pub via_tunnel: bool,
}

/// Terminal result of a dispatch, returned to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub succeeded: bool,
    pub message: String,
    pub error_kind: Option<ErrorKind>,
    /// HTTP status or remote exit code when the remote side rejected the action
    pub status_code: Option<i32>,
}

impl ActionOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            message: message.into(),
            error_kind: None,
            status_code: None,
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: message.into(),
            error_kind: Some(kind),
            status_code: None,
        }
    }

    /// Remote side answered with a rejection carrying `code`.
    pub fn rejected(code: i32, message: impl Into<String>) -> Self {
        Self {
            status_code: Some(code),
            ..Self::failure(ErrorKind::RemoteRejected, message)
        }
    }
}
