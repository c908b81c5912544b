//! Shared fixtures for cross-crate scenario tests

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wakegate_core::{HttpRequestKind, Site, SiteAction, WakeGateConfig};
use wakegate_identity::{parse_authorized_key, verify_signature, ShellIdentity, SoftwareKeystore};
use wakegate_network::{LinkAddress, NetworkTransport, PushNetworkMonitor};
use wakegate_router::{
    vault_from_config, CommandOutput, ShellConnector, ShellError, ShellSession, ShellTarget,
    WakeGate,
};

/// Install the test log subscriber (idempotent)
pub fn init_tracing() {
    wakegate_core::logging::init();
}

/// Bookkeeping shared by every session a [`RemoteHost`] opens
#[derive(Debug, Default)]
pub struct HostLog {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub executed: Mutex<Vec<(String, String)>>,
    pub hosts: Mutex<Vec<String>>,
}

impl HostLog {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Every opened session has been disconnected
    pub fn all_closed(&self) -> bool {
        self.opened() == self.closed.load(Ordering::SeqCst)
    }

    pub fn hosts(&self) -> Vec<String> {
        self.hosts.lock().unwrap().clone()
    }
}

/// Simulated remote shell host with an authorized_keys list.
///
/// Authentication succeeds only if the offered key is authorized and the
/// challenge signature verifies against it.
pub struct RemoteHost {
    authorized: Mutex<Vec<Vec<u8>>>,
    pub log: Arc<HostLog>,
}

impl RemoteHost {
    pub fn new() -> Self {
        Self {
            authorized: Mutex::new(Vec::new()),
            log: Arc::new(HostLog::default()),
        }
    }

    /// Append an exported `ssh-rsa ...` line to authorized_keys
    pub fn authorize(&self, line: &str) {
        let key = parse_authorized_key(line).unwrap();
        self.authorized.lock().unwrap().push(key.raw);
    }
}

#[async_trait]
impl ShellConnector for RemoteHost {
    async fn connect(&self, target: &ShellTarget) -> Result<Box<dyn ShellSession>, ShellError> {
        self.log.hosts.lock().unwrap().push(target.host.clone());
        self.log.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RemoteSession {
            authorized: self.authorized.lock().unwrap().clone(),
            log: Arc::clone(&self.log),
            user: None,
            closed: false,
        }))
    }
}

struct RemoteSession {
    authorized: Vec<Vec<u8>>,
    log: Arc<HostLog>,
    user: Option<String>,
    closed: bool,
}

#[async_trait]
impl ShellSession for RemoteSession {
    fn host_key_fingerprint(&self) -> Option<&str> {
        Some("SHA256:remotehostkey")
    }

    fn server_signature_algorithms(&self) -> Vec<String> {
        vec!["rsa-sha2-512".to_string(), "rsa-sha2-256".to_string()]
    }

    async fn authenticate(
        &mut self,
        username: &str,
        identity: &dyn ShellIdentity,
    ) -> Result<(), ShellError> {
        let offered = identity.public_key().to_vec();
        if !self.authorized.contains(&offered) {
            return Err(ShellError::AuthRejected("key not authorized".into()));
        }
        let challenge = format!("session-{username}").into_bytes();
        let signature = identity.sign_challenge(&challenge).await?;
        if !verify_signature(&offered, &challenge, &signature)? {
            return Err(ShellError::AuthRejected("bad signature".into()));
        }
        self.user = Some(username.to_string());
        Ok(())
    }

    async fn exec(&mut self, command: &str) -> Result<CommandOutput, ShellError> {
        let user = self
            .user
            .clone()
            .ok_or_else(|| ShellError::Channel("exec before authentication".into()))?;
        self.log
            .executed
            .lock()
            .unwrap()
            .push((user, command.to_string()));
        Ok(CommandOutput {
            exit_status: Some(0),
            stdout: format!("ran {command}\n"),
            stderr: String::new(),
        })
    }

    async fn disconnect(&mut self) {
        if !self.closed {
            self.closed = true;
            self.log.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Requests seen by a [`spawn_wol_listener`] listener
pub type WolRequests = Arc<Mutex<Vec<serde_json::Value>>>;

/// Start a loopback `/wol` listener that answers with `status`
pub async fn spawn_wol_listener(status: StatusCode) -> (String, WolRequests) {
    let requests: WolRequests = Arc::default();
    let seen = Arc::clone(&requests);
    let app = Router::new().route(
        "/wol",
        post(move |Json(body): Json<serde_json::Value>| async move {
            seen.lock().unwrap().push(body);
            (status, "done")
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), requests)
}

/// Site reaching a wake listener over HTTP at `base` on both paths
pub fn http_site(id: &str, base: &str) -> Site {
    Site {
        id: id.to_string(),
        display_name: "Wake listener".to_string(),
        local_endpoint: base.to_string(),
        tunnel_endpoint: base.to_string(),
        hardware_id: "AA:BB:CC:DD:EE:FF".to_string(),
        action: SiteAction::HttpJson {
            request: HttpRequestKind::Wol {
                broadcast_ip: "10.0.0.255".to_string(),
                port: 9,
            },
        },
    }
}

/// Fully wired pipeline over simulated platform pieces
pub struct Harness {
    pub monitor: Arc<PushNetworkMonitor>,
    pub keystore: Arc<SoftwareKeystore>,
    pub remote: Arc<RemoteHost>,
    pub gate: Arc<WakeGate>,
}

impl Harness {
    /// Default two-site configuration plus `extra_sites`; identity provisioned
    /// and authorized on the remote host.
    pub fn new(extra_sites: Vec<Site>) -> Self {
        init_tracing();
        let mut config = WakeGateConfig::default();
        config.network.ssid_wait_ms = 50;
        config.sites.extend(extra_sites);

        let monitor = Arc::new(PushNetworkMonitor::new());
        let keystore = Arc::new(SoftwareKeystore::new());
        let remote = Arc::new(RemoteHost::new());
        let vault = Arc::new(vault_from_config(&config, keystore.clone()));
        let gate = WakeGate::new(&config, monitor.clone(), vault, remote.clone()).unwrap();

        gate.ensure_identity().unwrap();
        remote.authorize(&gate.public_key_text().unwrap());

        Self {
            monitor,
            keystore,
            remote,
            gate: Arc::new(gate),
        }
    }

    /// Join a wired network at `addr`, optionally with the tunnel up
    pub fn join_ethernet(&self, addr: Ipv4Addr, tunnel: bool) {
        let mut transports = vec![NetworkTransport::Ethernet];
        if tunnel {
            transports.push(NetworkTransport::Vpn);
        }
        self.monitor
            .network_changed(transports, vec![LinkAddress::v4(addr, 24)]);
    }
}
