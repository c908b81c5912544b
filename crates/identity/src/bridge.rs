//! Identity bridge for remote-shell public-key authentication.
//!
//! A shell authenticator needs three things from an identity: the signature
//! scheme name to advertise, the public key blob, and a signature over the
//! session challenge. [`IdentityBridge`] answers all three from a
//! [`KeyVault`] without ever touching private key material.

use async_trait::async_trait;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::signature::Verifier as _;
use rsa::{BigUint, RsaPublicKey};
use sha2::Sha256;
use std::sync::Arc;
use tracing::debug;

use crate::error::BridgeError;
use crate::keystore::RsaPublicComponents;
use crate::public_key::components_from_raw;
use crate::vault::KeyVault;

/// SSH signature scheme produced by the keystore (SHA256withRSA).
pub const SIGNATURE_ALGORITHM: &str = "rsa-sha2-256";

/// Identity plugged into a shell session's public-key authentication.
#[async_trait]
pub trait ShellIdentity: Send + Sync {
    /// Signature scheme name advertised to the remote side.
    fn algorithm_name(&self) -> &str;

    /// Public key in SSH wire encoding.
    fn public_key(&self) -> &[u8];

    /// Sign the session challenge blob.
    async fn sign_challenge(&self, challenge: &[u8]) -> Result<Vec<u8>, BridgeError>;
}

/// Stateless adapter from [`KeyVault`] to [`ShellIdentity`].
///
/// Cheap to clone and safe to reuse across connection attempts; the public
/// key is read once at construction.
#[derive(Clone)]
pub struct IdentityBridge {
    vault: Arc<KeyVault>,
    alias: Arc<str>,
    public_blob: Arc<[u8]>,
}

impl IdentityBridge {
    pub fn new(vault: Arc<KeyVault>, alias: &str) -> Result<Self, BridgeError> {
        let public = vault.public_key(alias)?;
        Ok(Self {
            public_blob: Arc::from(public.raw()),
            alias: Arc::from(alias),
            vault,
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Check the remote side's offered signature schemes against ours.
    pub fn negotiate<S: AsRef<str>>(&self, offered: &[S]) -> Result<&'static str, BridgeError> {
        if offered.iter().any(|alg| alg.as_ref() == SIGNATURE_ALGORITHM) {
            Ok(SIGNATURE_ALGORITHM)
        } else {
            Err(BridgeError::AlgorithmMismatch {
                offered: offered
                    .iter()
                    .map(|alg| alg.as_ref())
                    .collect::<Vec<_>>()
                    .join(","),
                expected: SIGNATURE_ALGORITHM.to_string(),
            })
        }
    }

    /// Verify `signature` over `data` against this identity's public key.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool, BridgeError> {
        verify_signature(&self.public_blob, data, signature)
    }
}

/// Verify an `rsa-sha2-256` signature against a raw SSH public key blob,
/// as the remote side of public-key authentication does.
pub fn verify_signature(public_blob: &[u8], data: &[u8], signature: &[u8]) -> Result<bool, BridgeError> {
    let components =
        components_from_raw(public_blob).map_err(|e| BridgeError::Signer(e.to_string()))?;
    verify_with_components(&components, data, signature)
}

/// Wrap a raw signature in the SSH signature encoding
/// (`string algorithm || string signature`).
pub fn encode_signature_blob(signature: &[u8]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(8 + SIGNATURE_ALGORITHM.len() + signature.len());
    for field in [SIGNATURE_ALGORITHM.as_bytes(), signature] {
        blob.extend_from_slice(&(field.len() as u32).to_be_bytes());
        blob.extend_from_slice(field);
    }
    blob
}

fn verify_with_components(
    components: &RsaPublicComponents,
    data: &[u8],
    signature: &[u8],
) -> Result<bool, BridgeError> {
    let key = RsaPublicKey::new(
        BigUint::from_bytes_be(&components.modulus),
        BigUint::from_bytes_be(&components.exponent),
    )
    .map_err(|e| BridgeError::Signer(format!("invalid RSA public key: {e}")))?;
    let signature = Signature::try_from(signature)
        .map_err(|e| BridgeError::MalformedSignature(e.to_string()))?;

    Ok(VerifyingKey::<Sha256>::new(key)
        .verify(data, &signature)
        .is_ok())
}

#[async_trait]
impl ShellIdentity for IdentityBridge {
    fn algorithm_name(&self) -> &str {
        SIGNATURE_ALGORITHM
    }

    fn public_key(&self) -> &[u8] {
        &self.public_blob
    }

    async fn sign_challenge(&self, challenge: &[u8]) -> Result<Vec<u8>, BridgeError> {
        let vault = Arc::clone(&self.vault);
        let alias = Arc::clone(&self.alias);
        let challenge = challenge.to_vec();
        debug!(alias = %alias, len = challenge.len(), "signing authentication challenge");

        // Keystore access may block on a user-presence prompt
        tokio::task::spawn_blocking(move || vault.sign(&alias, &challenge))
            .await
            .map_err(|e| BridgeError::Signer(format!("signing task failed: {e}")))?
            .map_err(BridgeError::from)
    }
}
