//! Static site table
//!
//! A site is a remote target reachable through a local endpoint when the
//! device sits on a trusted network, or through a tunnel endpoint otherwise.
//! The transport a site speaks is fixed by its configured action.

use crate::error::{ConfigError, CoreError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Remote protocol family used to reach a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Remote shell command over a public-key authenticated session
    Shell,
    /// HTTP(S) POST with a JSON body
    HttpJson,
}

/// Request sent by the HTTP JSON transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HttpRequestKind {
    /// POST `/wol` with `{mac, ip, port}`
    Wol {
        broadcast_ip: String,
        #[serde(default = "default_wol_port")]
        port: u16,
    },
    /// POST `/execute` with `{command}`
    Execute { command: String },
}

impl HttpRequestKind {
    pub fn path(&self) -> &'static str {
        match self {
            HttpRequestKind::Wol { .. } => "/wol",
            HttpRequestKind::Execute { .. } => "/execute",
        }
    }
}

/// Fixed action performed against a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum SiteAction {
    Shell {
        username: String,
        command: String,
        #[serde(default = "default_ssh_port")]
        port: u16,
        /// Expected `SHA256:` host key fingerprint; unset accepts any host key
        #[serde(default)]
        host_key_fingerprint: Option<String>,
    },
    HttpJson { request: HttpRequestKind },
}

impl SiteAction {
    pub fn transport_kind(&self) -> TransportKind {
        match self {
            SiteAction::Shell { .. } => TransportKind::Shell,
            SiteAction::HttpJson { .. } => TransportKind::HttpJson,
        }
    }
}

/// A configured remote target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    /// Host (shell) or base URL (HTTP) on the trusted local network
    pub local_endpoint: String,
    /// Host or base URL reachable through the tunnel
    pub tunnel_endpoint: String,
    /// MAC address of the machine to wake
    pub hardware_id: String,
    pub action: SiteAction,
}

impl Site {
    pub fn transport_kind(&self) -> TransportKind {
        self.action.transport_kind()
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::Validation("site id must not be empty".into()));
        }
        if self.local_endpoint.trim().is_empty() || self.tunnel_endpoint.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "site '{}' needs both a local and a tunnel endpoint",
                self.id
            )));
        }
        if !is_mac_address(&self.hardware_id) {
            return Err(ConfigError::Validation(format!(
                "site '{}' has invalid hardware id '{}'",
                self.id, self.hardware_id
            )));
        }
        match &self.action {
            SiteAction::Shell { username, command, .. } => {
                if username.is_empty() || command.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "site '{}' shell action needs a username and command",
                        self.id
                    )));
                }
            }
            SiteAction::HttpJson {
                request: HttpRequestKind::Execute { command },
            } if command.is_empty() => {
                return Err(ConfigError::Validation(format!(
                    "site '{}' execute request needs a command",
                    self.id
                )));
            }
            SiteAction::HttpJson { .. } => {}
        }
        Ok(())
    }
}

/// Lookup table from site id to [`Site`].
#[derive(Debug, Clone, Default)]
pub struct SiteTable {
    sites: HashMap<String, Site>,
}

impl SiteTable {
    /// Build a table, rejecting duplicate ids.
    pub fn new(sites: impl IntoIterator<Item = Site>) -> Result<Self, ConfigError> {
        let mut table = HashMap::new();
        for site in sites {
            if table.contains_key(&site.id) {
                return Err(ConfigError::DuplicateSite(site.id));
            }
            table.insert(site.id.clone(), site);
        }
        Ok(Self { sites: table })
    }

    pub fn get(&self, site_id: &str) -> Result<&Site, CoreError> {
        self.sites
            .get(site_id)
            .ok_or_else(|| CoreError::UnknownSite(site_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sites.keys().map(String::as_str)
    }
}

fn is_mac_address(value: &str) -> bool {
    let parts: Vec<&str> = value.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
}

fn default_ssh_port() -> u16 {
    22
}

fn default_wol_port() -> u16 {
    9
}
