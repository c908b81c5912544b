//! SSH engine for the shell transport, built on `russh`.
//!
//! Public-key authentication uses russh's external signer hook, so the
//! device identity signs inside the keystore and no private key is ever
//! loaded into the SSH client. The presented host key is recorded once key
//! exchange completes; the executor applies the configured
//! [`HostKeyPolicy`](crate::shell::HostKeyPolicy) to it.

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, CryptoVec, Disconnect};
use russh_keys::key::{self, SignatureHash};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;
use wakegate_core::TimeoutConfig;
use wakegate_identity::{encode_signature_blob, BridgeError, ShellIdentity};

use crate::shell::{CommandOutput, ShellConnector, ShellError, ShellSession, ShellTarget};

/// Extended data stream carrying stderr
const STDERR_STREAM: u32 = 1;

impl From<russh::SendError> for ShellError {
    fn from(_: russh::SendError) -> Self {
        ShellError::Channel("session closed during authentication".into())
    }
}

/// [`ShellConnector`] speaking SSH over TCP.
pub struct RusshConnector {
    config: Arc<client::Config>,
}

impl RusshConnector {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let config = client::Config {
            inactivity_timeout: Some(timeouts.read()),
            ..client::Config::default()
        };
        Self {
            config: Arc::new(config),
        }
    }
}

#[async_trait]
impl ShellConnector for RusshConnector {
    async fn connect(&self, target: &ShellTarget) -> Result<Box<dyn ShellSession>, ShellError> {
        let (key_tx, key_rx) = oneshot::channel();
        let handler = HostKeyRecorder {
            presented: Some(key_tx),
        };

        let handle = client::connect(
            Arc::clone(&self.config),
            (target.host.as_str(), target.port),
            handler,
        )
        .await
        .map_err(|e| ShellError::Connect(format!("{}:{}: {e}", target.host, target.port)))?;

        // Handler is dropped without reporting if key exchange fails
        let fingerprint = key_rx.await.map_err(|_| {
            ShellError::Connect(format!(
                "{}:{}: key exchange did not complete",
                target.host, target.port
            ))
        })?;
        debug!(host = %target.host, fingerprint = %fingerprint, "ssh key exchange complete");

        Ok(Box::new(RusshSession {
            handle,
            host_key_fingerprint: fingerprint,
            closed: false,
        }))
    }
}

/// Accepts every host key and reports its fingerprint to the connector.
struct HostKeyRecorder {
    presented: Option<oneshot::Sender<String>>,
}

#[async_trait]
impl client::Handler for HostKeyRecorder {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &key::PublicKey,
    ) -> Result<bool, Self::Error> {
        if let Some(tx) = self.presented.take() {
            let _ = tx.send(format!("SHA256:{}", server_public_key.fingerprint()));
        }
        Ok(true)
    }
}

struct RusshSession {
    handle: Handle<HostKeyRecorder>,
    host_key_fingerprint: String,
    closed: bool,
}

#[async_trait]
impl ShellSession for RusshSession {
    fn host_key_fingerprint(&self) -> Option<&str> {
        Some(&self.host_key_fingerprint)
    }

    async fn authenticate(
        &mut self,
        username: &str,
        identity: &dyn ShellIdentity,
    ) -> Result<(), ShellError> {
        let public_key = ssh_public_key(identity)?;
        let signer = IdentitySigner { identity };
        let (_, accepted) = self
            .handle
            .authenticate_future(username, public_key, signer)
            .await;

        if accepted? {
            Ok(())
        } else {
            Err(ShellError::AuthRejected(format!(
                "publickey refused for {username}"
            )))
        }
    }

    async fn exec(&mut self, command: &str) -> Result<CommandOutput, ShellError> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(channel_error)?;
        channel.exec(true, command).await.map_err(channel_error)?;

        let mut exit_status = None;
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext } if ext == STDERR_STREAM => {
                    stderr.extend_from_slice(data)
                }
                ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
                _ => {}
            }
        }

        Ok(CommandOutput {
            exit_status,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }

    async fn disconnect(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            debug!(error = %err, "ssh transport already gone at disconnect");
        }
    }
}

/// Signs the authentication request through the device identity.
struct IdentitySigner<'a> {
    identity: &'a dyn ShellIdentity,
}

impl<'a> russh::Signer for IdentitySigner<'a> {
    type Error = ShellError;
    type Future = Pin<Box<dyn Future<Output = (Self, Result<CryptoVec, ShellError>)> + Send + 'a>>;

    fn auth_publickey_sign(self, _key: &key::PublicKey, mut to_sign: CryptoVec) -> Self::Future {
        Box::pin(async move {
            let signature = self.identity.sign_challenge(&to_sign).await;
            let signed = match signature {
                Ok(signature) => {
                    to_sign.extend(&signature_field(&signature));
                    Ok(to_sign)
                }
                Err(err) => Err(ShellError::from(err)),
            };
            (self, signed)
        })
    }
}

/// The identity's key as russh sees it, advertising `rsa-sha2-256`.
fn ssh_public_key(identity: &dyn ShellIdentity) -> Result<key::PublicKey, ShellError> {
    key::parse_public_key(identity.public_key(), Some(SignatureHash::SHA2_256)).map_err(|e| {
        ShellError::Identity(BridgeError::Signer(format!(
            "identity key not usable for ssh: {e}"
        )))
    })
}

/// Signature field appended to the signed request:
/// `string(string algorithm || string signature)`.
fn signature_field(signature: &[u8]) -> Vec<u8> {
    let blob = encode_signature_blob(signature);
    let mut field = Vec::with_capacity(4 + blob.len());
    field.extend_from_slice(&(blob.len() as u32).to_be_bytes());
    field.extend_from_slice(&blob);
    field
}

fn channel_error(err: russh::Error) -> ShellError {
    ShellError::Channel(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{HostKeyPolicy, ShellExecutor};
    use std::time::Duration;
    use wakegate_core::ErrorKind;
    use wakegate_identity::{IdentityBridge, KeySpec, KeyVault, SoftwareKeystore, SIGNATURE_ALGORITHM};

    fn identity() -> IdentityBridge {
        let store = Arc::new(SoftwareKeystore::new());
        let vault = Arc::new(KeyVault::new(store, KeySpec::signing(2048), "test"));
        vault.ensure_identity("device").unwrap();
        IdentityBridge::new(vault, "device").unwrap()
    }

    fn read_string(buf: &[u8]) -> (&[u8], &[u8]) {
        let len = u32::from_be_bytes(buf[..4].try_into().unwrap()) as usize;
        (&buf[4..4 + len], &buf[4 + len..])
    }

    #[test]
    fn test_signature_field_layout() {
        let field = signature_field(&[7u8; 256]);
        let (blob, rest) = read_string(&field);
        assert!(rest.is_empty());

        let (algorithm, rest) = read_string(blob);
        assert_eq!(algorithm, SIGNATURE_ALGORITHM.as_bytes());
        let (signature, rest) = read_string(rest);
        assert_eq!(signature, &[7u8; 256][..]);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_identity_key_advertises_rsa_sha2_256() {
        let identity = identity();
        let key = ssh_public_key(&identity).unwrap();
        assert_eq!(key.name(), SIGNATURE_ALGORITHM);
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let connector = RusshConnector::new(&TimeoutConfig::default());
        let target = ShellTarget {
            host: "127.0.0.1".to_string(),
            port,
            username: "wol".to_string(),
        };
        let err = match connector.connect(&target).await {
            Ok(_) => panic!("connected to a closed port"),
            Err(err) => err,
        };
        assert!(matches!(err, ShellError::Connect(_)));
        assert_eq!(err.error_kind(), ErrorKind::TransportError);
    }

    #[tokio::test]
    async fn test_silent_server_hits_connect_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // Accepts TCP but never sends an SSH banner
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let timeouts = TimeoutConfig {
            connect_ms: 200,
            ..TimeoutConfig::default()
        };
        let connector = RusshConnector::new(&timeouts);
        let target = ShellTarget {
            host: "127.0.0.1".to_string(),
            port,
            username: "wol".to_string(),
        };

        let started = std::time::Instant::now();
        let err = ShellExecutor::new(&connector, &timeouts)
            .run(&target, &HostKeyPolicy::AcceptAny, &identity(), "true")
            .await
            .unwrap_err();
        assert!(matches!(err, ShellError::Timeout { stage: "connect", .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
        server.abort();
    }
}
