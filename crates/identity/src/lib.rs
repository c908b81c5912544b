//! Device identity management for WakeGate.
//!
//! This crate owns the device's asymmetric identity. The key pair is
//! generated once inside a hardware-isolated keystore; the private half is
//! never exported and is only reachable through a `sign(bytes)` capability.
//!
//! # Core Concepts
//!
//! - **HardwareKeystore**: platform seam to the secure element
//! - **KeyVault**: idempotent identity provisioning, public key export, signing
//! - **IdentityBridge**: adapts the vault to remote-shell public-key authentication
//!
//! # Security Model
//!
//! - Private key material never crosses the keystore boundary
//! - Identity material is never logged; fingerprints are
//! - A locked or invalidated store is a recoverable condition, not a crash

pub mod bridge;
pub mod error;
pub mod keystore;
pub mod public_key;
pub mod vault;

pub use bridge::{
    encode_signature_blob, verify_signature, IdentityBridge, ShellIdentity, SIGNATURE_ALGORITHM,
};
pub use error::{BridgeError, KeystoreError, VaultError, VaultResult};
pub use keystore::{
    HardwareKeystore, KeyPurpose, KeySpec, KeystoreMetadata, RsaPublicComponents,
    SoftwareKeystore,
};
pub use public_key::{parse_authorized_key, AuthorizedKey, ExportedPublicKey, KEY_ALGORITHM_ID};
pub use vault::{Identity, KeyVault};
