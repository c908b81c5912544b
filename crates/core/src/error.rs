//! Core error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure classes reported to the presentation layer.
///
/// Every crate-level error maps onto exactly one kind, so the caller can
/// decide between prompting the user, retrying, or surfacing the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Hardware store locked or key invalidated; user must re-authenticate.
    KeyUnavailable,
    /// Identity was never created for the requested alias.
    NotFound,
    /// Remote side negotiated a signature scheme we cannot produce.
    AlgorithmMismatch,
    /// No active network; re-resolve later.
    NetworkUnresolved,
    /// Trust gate blocked the action until a tunnel is active.
    RequireTunnel,
    /// Connection, authentication or I/O failure during dispatch.
    TransportError,
    /// A bounded wait elapsed.
    Timeout,
    /// Remote side answered but rejected the action.
    RemoteRejected,
    /// Unknown site or invalid configuration.
    Configuration,
}

impl ErrorKind {
    /// Whether the user can recover without changing configuration.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ErrorKind::AlgorithmMismatch | ErrorKind::Configuration)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::KeyUnavailable => "key unavailable",
            ErrorKind::NotFound => "not found",
            ErrorKind::AlgorithmMismatch => "algorithm mismatch",
            ErrorKind::NetworkUnresolved => "network unresolved",
            ErrorKind::RequireTunnel => "tunnel required",
            ErrorKind::TransportError => "transport error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RemoteRejected => "remote rejected",
            ErrorKind::Configuration => "configuration",
        };
        f.write_str(name)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid subnet '{0}': expected CIDR (10.0.0.0/24) or dotted prefix (10.0.0.)")]
    InvalidSubnet(String),

    #[error("Duplicate site id: {0}")]
    DuplicateSite(String),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Core error type for WakeGate
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Site lookup failed
    #[error("Unknown site: {0}")]
    UnknownSite(String),
}

impl CoreError {
    pub fn error_kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(ErrorKind::KeyUnavailable.is_recoverable());
        assert!(ErrorKind::RequireTunnel.is_recoverable());
        assert!(ErrorKind::Timeout.is_recoverable());
        assert!(!ErrorKind::AlgorithmMismatch.is_recoverable());
        assert!(!ErrorKind::Configuration.is_recoverable());
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::RemoteRejected).unwrap();
        assert_eq!(json, "\"remote_rejected\"");
    }
}
