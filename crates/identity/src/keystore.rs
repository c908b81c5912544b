//! Hardware keystore integration for the device identity.
//!
//! The private half of the identity never leaves the keystore: the core only
//! holds an alias and asks the store to sign on its behalf. Platforms supply a
//! [`HardwareKeystore`] backed by their secure element (Android Keystore,
//! StrongBox, TPM). [`SoftwareKeystore`] is an in-process backend for
//! desktop development and tests; it is not hardware isolated.

use rand::rngs::OsRng;
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer as _};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::KeystoreError;

/// Operations a generated key is authorized for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPurpose {
    Sign,
    Verify,
}

/// Parameters for key generation inside the keystore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    /// RSA modulus size in bits
    pub key_size_bits: u32,
    pub purposes: Vec<KeyPurpose>,
}

impl KeySpec {
    /// Sign/verify RSA key with SHA-256 PKCS#1 v1.5 signatures.
    pub fn signing(key_size_bits: u32) -> Self {
        Self {
            key_size_bits,
            purposes: vec![KeyPurpose::Sign, KeyPurpose::Verify],
        }
    }
}

/// Public half of an RSA key as big-endian integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RsaPublicComponents {
    pub modulus: Vec<u8>,
    pub exponent: Vec<u8>,
}

/// Backend metadata for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeystoreMetadata {
    /// Backend identifier.
    pub backend: String,
    /// Whether key operations are hardware-backed.
    pub hardware_backed: bool,
    /// Security level reported by the store (software/trusted_environment/strongbox).
    pub security_level: String,
}

/// Capability-scoped access to a non-exportable key store.
///
/// `sign` may block on hardware access or a user-presence prompt; callers
/// run it on a blocking worker, never on a latency-sensitive thread.
pub trait HardwareKeystore: Send + Sync {
    fn contains_alias(&self, alias: &str) -> Result<bool, KeystoreError>;

    /// Generate a key pair under `alias`. The private key stays in the store.
    fn generate_key_pair(&self, alias: &str, spec: &KeySpec) -> Result<(), KeystoreError>;

    fn public_components(&self, alias: &str) -> Result<RsaPublicComponents, KeystoreError>;

    /// SHA256withRSA (PKCS#1 v1.5) signature over `data`.
    fn sign(&self, alias: &str, data: &[u8]) -> Result<Vec<u8>, KeystoreError>;

    fn metadata(&self) -> KeystoreMetadata;
}

struct SoftwareKeyRecord {
    signing_key: SigningKey<Sha256>,
    public: RsaPublicComponents,
    invalidated: bool,
}

#[derive(Default)]
struct SoftwareState {
    keys: HashMap<String, SoftwareKeyRecord>,
    locked: bool,
}

/// In-process keystore used on desktops and in tests.
///
/// Supports locking and key invalidation so callers can exercise the
/// recoverable failure paths of a real secure element.
#[derive(Default)]
pub struct SoftwareKeystore {
    state: Mutex<SoftwareState>,
}

impl SoftwareKeystore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, SoftwareState>, KeystoreError> {
        self.state
            .lock()
            .map_err(|_| KeystoreError::Backend("keystore state poisoned".to_string()))
    }

    /// Simulate the device locking; signing fails until [`unlock`](Self::unlock).
    pub fn lock(&self) {
        if let Ok(mut state) = self.state() {
            state.locked = true;
        }
    }

    pub fn unlock(&self) {
        if let Ok(mut state) = self.state() {
            state.locked = false;
        }
    }

    /// Simulate invalidation after a device credential change.
    pub fn invalidate(&self, alias: &str) {
        if let Ok(mut state) = self.state() {
            if let Some(record) = state.keys.get_mut(alias) {
                record.invalidated = true;
            }
        }
    }
}

impl HardwareKeystore for SoftwareKeystore {
    fn contains_alias(&self, alias: &str) -> Result<bool, KeystoreError> {
        Ok(self.state()?.keys.contains_key(alias))
    }

    fn generate_key_pair(&self, alias: &str, spec: &KeySpec) -> Result<(), KeystoreError> {
        if !spec.purposes.contains(&KeyPurpose::Sign) {
            return Err(KeystoreError::UnsupportedSpec(
                "signing purpose required".to_string(),
            ));
        }

        let private = RsaPrivateKey::new(&mut OsRng, spec.key_size_bits as usize)
            .map_err(|e| KeystoreError::Backend(format!("RSA key generation failed: {e}")))?;
        let public = RsaPublicComponents {
            modulus: private.n().to_bytes_be(),
            exponent: private.e().to_bytes_be(),
        };

        self.state()?.keys.insert(
            alias.to_string(),
            SoftwareKeyRecord {
                signing_key: SigningKey::<Sha256>::new(private),
                public,
                invalidated: false,
            },
        );
        Ok(())
    }

    fn public_components(&self, alias: &str) -> Result<RsaPublicComponents, KeystoreError> {
        let state = self.state()?;
        let record = state.keys.get(alias).ok_or_else(|| KeystoreError::NotFound {
            alias: alias.to_string(),
        })?;
        Ok(record.public.clone())
    }

    fn sign(&self, alias: &str, data: &[u8]) -> Result<Vec<u8>, KeystoreError> {
        let state = self.state()?;
        if state.locked {
            return Err(KeystoreError::Locked);
        }
        let record = state.keys.get(alias).ok_or_else(|| KeystoreError::NotFound {
            alias: alias.to_string(),
        })?;
        if record.invalidated {
            return Err(KeystoreError::Invalidated {
                alias: alias.to_string(),
            });
        }

        let signature = record
            .signing_key
            .try_sign(data)
            .map_err(|e| KeystoreError::Backend(format!("signing failed: {e}")))?;
        Ok(signature.to_vec())
    }

    fn metadata(&self) -> KeystoreMetadata {
        KeystoreMetadata {
            backend: "software".to_string(),
            hardware_backed: false,
            security_level: "software".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn software_key_sign_and_lock() {
        let store = SoftwareKeystore::new();
        assert!(!store.contains_alias("device").unwrap());

        store
            .generate_key_pair("device", &KeySpec::signing(2048))
            .unwrap();
        assert!(store.contains_alias("device").unwrap());

        let public = store.public_components("device").unwrap();
        assert_eq!(public.modulus.len(), 256);
        assert_eq!(public.exponent, vec![0x01, 0x00, 0x01]);

        let signature = store.sign("device", b"challenge").unwrap();
        assert_eq!(signature.len(), 256);

        store.lock();
        assert_eq!(store.sign("device", b"challenge"), Err(KeystoreError::Locked));
        store.unlock();
        assert!(store.sign("device", b"challenge").is_ok());

        store.invalidate("device");
        assert!(matches!(
            store.sign("device", b"challenge"),
            Err(KeystoreError::Invalidated { .. })
        ));

        let metadata = store.metadata();
        assert_eq!(metadata.backend, "software");
        assert!(!metadata.hardware_backed);
    }

    #[test]
    fn missing_alias_reports_not_found() {
        let store = SoftwareKeystore::new();
        assert!(matches!(
            store.public_components("nope"),
            Err(KeystoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.sign("nope", b"x"),
            Err(KeystoreError::NotFound { .. })
        ));
    }

    #[test]
    fn spec_without_sign_purpose_rejected() {
        let store = SoftwareKeystore::new();
        let spec = KeySpec {
            key_size_bits: 2048,
            purposes: vec![KeyPurpose::Verify],
        };
        assert!(matches!(
            store.generate_key_pair("device", &spec),
            Err(KeystoreError::UnsupportedSpec(_))
        ));
    }
}
