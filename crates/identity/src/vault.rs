//! Device identity vault.
//!
//! Owns the lifecycle of the device's signing identity: create it once in
//! the keystore, export its public half, and sign through the keystore.
//! Identity material is never logged; only fingerprints are.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, info, warn};
use wakegate_core::MIN_KEY_SIZE_BITS;

use crate::error::{KeystoreError, VaultError, VaultResult};
use crate::keystore::{HardwareKeystore, KeySpec, KeystoreMetadata};
use crate::public_key::ExportedPublicKey;

static GLOBAL_VAULT: OnceLock<Arc<KeyVault>> = OnceLock::new();

/// Handle to an identity held in the keystore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub alias: String,
    pub public_key: ExportedPublicKey,
}

/// Key vault backed by a [`HardwareKeystore`].
pub struct KeyVault {
    keystore: Arc<dyn HardwareKeystore>,
    spec: KeySpec,
    comment: String,
    /// Serializes check-then-generate in `ensure_identity`
    provisioning: Mutex<()>,
}

impl KeyVault {
    pub fn new(keystore: Arc<dyn HardwareKeystore>, spec: KeySpec, comment: impl Into<String>) -> Self {
        Self {
            keystore,
            spec,
            comment: comment.into(),
            provisioning: Mutex::new(()),
        }
    }

    /// Create the identity under `alias` if it does not exist yet.
    ///
    /// Idempotent: an existing alias is left untouched and its public key
    /// returned.
    pub fn ensure_identity(&self, alias: &str) -> VaultResult<Identity> {
        {
            let _guard = self
                .provisioning
                .lock()
                .map_err(|_| {
                    VaultError::Keystore(KeystoreError::Backend("provisioning lock poisoned".into()))
                })?;

            let exists = self
                .keystore
                .contains_alias(alias)
                .map_err(|e| VaultError::from_keystore(alias, e))?;
            if exists {
                debug!(alias, "identity already present");
            } else {
                if self.spec.key_size_bits < MIN_KEY_SIZE_BITS {
                    return Err(VaultError::Keystore(KeystoreError::UnsupportedSpec(format!(
                        "{}-bit keys are below the {MIN_KEY_SIZE_BITS}-bit minimum",
                        self.spec.key_size_bits
                    ))));
                }
                info!(alias, bits = self.spec.key_size_bits, "generating device identity");
                self.keystore
                    .generate_key_pair(alias, &self.spec)
                    .map_err(|e| VaultError::from_keystore(alias, e))?;
            }
        }

        let public_key = self.public_key(alias)?;
        info!(alias, fingerprint = public_key.fingerprint(), "device identity ready");
        Ok(Identity {
            alias: alias.to_string(),
            public_key,
        })
    }

    /// Public key for `alias` in raw and authorized-key text form.
    pub fn public_key(&self, alias: &str) -> VaultResult<ExportedPublicKey> {
        let components = self
            .keystore
            .public_components(alias)
            .map_err(|e| VaultError::from_keystore(alias, e))?;
        ExportedPublicKey::from_components(&components, &self.comment)
    }

    /// Sign `data` with the identity's private key (SHA-256 + RSA).
    ///
    /// May block on the keystore; run it on a blocking worker.
    pub fn sign(&self, alias: &str, data: &[u8]) -> VaultResult<Vec<u8>> {
        self.keystore.sign(alias, data).map_err(|e| {
            let err = VaultError::from_keystore(alias, e);
            warn!(alias, error = %err, "keystore refused to sign");
            err
        })
    }

    pub fn keystore_metadata(&self) -> KeystoreMetadata {
        self.keystore.metadata()
    }
}

/// Install the process-wide vault. Fails if one is already installed.
pub fn install_global(vault: KeyVault) -> VaultResult<Arc<KeyVault>> {
    let vault = Arc::new(vault);
    GLOBAL_VAULT
        .set(Arc::clone(&vault))
        .map_err(|_| VaultError::AlreadyInstalled)?;
    Ok(vault)
}

/// Process-wide vault, if installed.
pub fn global() -> Option<Arc<KeyVault>> {
    GLOBAL_VAULT.get().cloned()
}
