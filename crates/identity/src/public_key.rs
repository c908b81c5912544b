//! Portable public key export.
//!
//! The raw form is the SSH wire encoding of the RSA public key (the blob a
//! remote shell server sees during public-key authentication). The text form
//! is a single authorized-keys line: `ssh-rsa <base64(raw)> <comment>`.

use serde::{Deserialize, Serialize};
use ssh_key::public::{KeyData, RsaPublicKey};
use ssh_key::{Algorithm, HashAlg, Mpint, PublicKey};

use crate::error::VaultError;
use crate::keystore::RsaPublicComponents;

/// Algorithm identifier that prefixes the exported key line.
pub const KEY_ALGORITHM_ID: &str = "ssh-rsa";

/// Public half of the device identity in both export forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedPublicKey {
    raw: Vec<u8>,
    text: String,
    fingerprint: String,
}

impl ExportedPublicKey {
    /// Encode RSA components with `comment` appended to the text form.
    pub fn from_components(
        components: &RsaPublicComponents,
        comment: &str,
    ) -> Result<Self, VaultError> {
        let encoding = |e: ssh_key::Error| VaultError::Encoding(e.to_string());

        let key_data = KeyData::Rsa(RsaPublicKey {
            e: Mpint::from_positive_bytes(&components.exponent).map_err(encoding)?,
            n: Mpint::from_positive_bytes(&components.modulus).map_err(encoding)?,
        });
        let public = PublicKey::new(key_data, comment);

        Ok(Self {
            raw: public.to_bytes().map_err(encoding)?,
            text: public.to_openssh().map_err(encoding)?,
            fingerprint: public.fingerprint(HashAlg::Sha256).to_string(),
        })
    }

    /// SSH wire encoding of the key.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Single-line authorized-keys text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// `SHA256:<base64>` fingerprint, safe to log.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

/// Key recovered from an authorized-keys line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedKey {
    pub raw: Vec<u8>,
    pub comment: String,
}

/// Parse an exported line back into its raw wire encoding.
pub fn parse_authorized_key(line: &str) -> Result<AuthorizedKey, VaultError> {
    let public = PublicKey::from_openssh(line.trim())
        .map_err(|e| VaultError::Encoding(format!("invalid authorized key: {e}")))?;

    if public.algorithm() != (Algorithm::Rsa { hash: None }) {
        return Err(VaultError::Encoding(format!(
            "expected {KEY_ALGORITHM_ID}, found {}",
            public.algorithm()
        )));
    }

    Ok(AuthorizedKey {
        raw: public
            .to_bytes()
            .map_err(|e| VaultError::Encoding(e.to_string()))?,
        comment: public.comment().to_string(),
    })
}

/// Extract the RSA components back out of a raw wire blob.
pub fn components_from_raw(raw: &[u8]) -> Result<RsaPublicComponents, VaultError> {
    let public =
        PublicKey::from_bytes(raw).map_err(|e| VaultError::Encoding(e.to_string()))?;
    let rsa = public
        .key_data()
        .rsa()
        .ok_or_else(|| VaultError::Encoding(format!("expected {KEY_ALGORITHM_ID} key blob")))?;

    let positive = |m: &Mpint| {
        m.as_positive_bytes()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| VaultError::Encoding("negative RSA integer".to_string()))
    };
    Ok(RsaPublicComponents {
        modulus: positive(&rsa.n)?,
        exponent: positive(&rsa.e)?,
    })
}
