//! Error types for WakeGate identity operations.

use thiserror::Error;
use wakegate_core::ErrorKind;

/// Errors reported by a hardware keystore backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeystoreError {
    /// Store requires user authentication before use
    #[error("Keystore is locked")]
    Locked,

    /// Key was permanently invalidated (e.g. device credential change)
    #[error("Key invalidated: {alias}")]
    Invalidated { alias: String },

    #[error("Key not found: {alias}")]
    NotFound { alias: String },

    #[error("Unsupported key specification: {0}")]
    UnsupportedSpec(String),

    #[error("Keystore backend error: {0}")]
    Backend(String),
}

/// Errors that can occur in key vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Identity was never created
    #[error("Identity not found: {alias}")]
    NotFound { alias: String },

    /// Store locked or key invalidated; recoverable by re-authentication
    #[error("Key unavailable for '{alias}': {reason}")]
    KeyUnavailable { alias: String, reason: String },

    /// Public key could not be encoded for export
    #[error("Public key encoding failed: {0}")]
    Encoding(String),

    #[error("Keystore error: {0}")]
    Keystore(KeystoreError),

    /// Process-wide vault installed twice
    #[error("Key vault already installed")]
    AlreadyInstalled,
}

impl VaultError {
    pub(crate) fn from_keystore(alias: &str, err: KeystoreError) -> Self {
        match err {
            KeystoreError::Locked => VaultError::KeyUnavailable {
                alias: alias.to_string(),
                reason: "keystore locked".to_string(),
            },
            KeystoreError::Invalidated { .. } => VaultError::KeyUnavailable {
                alias: alias.to_string(),
                reason: "key invalidated".to_string(),
            },
            KeystoreError::NotFound { .. } => VaultError::NotFound {
                alias: alias.to_string(),
            },
            other => VaultError::Keystore(other),
        }
    }

    pub fn error_kind(&self) -> ErrorKind {
        match self {
            VaultError::NotFound { .. } => ErrorKind::NotFound,
            VaultError::KeyUnavailable { .. } => ErrorKind::KeyUnavailable,
            VaultError::Encoding(_) | VaultError::Keystore(_) | VaultError::AlreadyInstalled => {
                ErrorKind::Configuration
            }
        }
    }
}

/// Errors surfaced by the identity bridge to the shell authenticator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// Signing key exists but cannot be used right now; prompt the user
    #[error("Authentication unavailable: {0}")]
    AuthUnavailable(String),

    #[error("Signature algorithm mismatch: remote offered [{offered}], we sign with {expected}")]
    AlgorithmMismatch { offered: String, expected: String },

    #[error("Identity not found: {0}")]
    IdentityNotFound(String),

    #[error("Signing failed: {0}")]
    Signer(String),

    #[error("Malformed signature: {0}")]
    MalformedSignature(String),
}

impl BridgeError {
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            BridgeError::AuthUnavailable(_) => ErrorKind::KeyUnavailable,
            BridgeError::AlgorithmMismatch { .. } => ErrorKind::AlgorithmMismatch,
            BridgeError::IdentityNotFound(_) => ErrorKind::NotFound,
            BridgeError::Signer(_) | BridgeError::MalformedSignature(_) => {
                ErrorKind::TransportError
            }
        }
    }
}

impl From<VaultError> for BridgeError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::KeyUnavailable { reason, .. } => BridgeError::AuthUnavailable(reason),
            VaultError::NotFound { alias } => BridgeError::IdentityNotFound(alias),
            other => BridgeError::Signer(other.to_string()),
        }
    }
}

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;
