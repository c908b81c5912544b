//! Configuration management for WakeGate.
//!
//! Configuration is read from a TOML file. Every section has defaults, so an
//! empty file (or [`WakeGateConfig::default`]) yields a working two-site setup.

use crate::error::ConfigError;
use crate::site::{Site, SiteAction, SiteTable};
use crate::types::SubnetPrefix;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Smallest RSA modulus accepted for the device identity.
pub const MIN_KEY_SIZE_BITS: u32 = 2048;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WakeGateConfig {
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub tunnel: TunnelConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default = "default_sites")]
    pub sites: Vec<Site>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_alias")]
    pub alias: String,
    #[serde(default = "default_comment")]
    pub comment: String,
    #[serde(default = "default_key_size")]
    pub key_size_bits: u32,
}

/// A network the device treats as trusted-local.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustedNetwork {
    #[serde(default)]
    pub ssid: Option<String>,
    #[serde(default)]
    pub subnet: Option<SubnetPrefix>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bounded wait for a capability notification carrying the SSID
    #[serde(default = "default_ssid_wait")]
    pub ssid_wait_ms: u64,
    /// Re-resolutions allowed when the active network changes mid-resolution
    #[serde(default = "default_generation_retries")]
    pub max_generation_retries: u32,
    #[serde(default = "default_home")]
    pub home: TrustedNetwork,
    #[serde(default)]
    pub work: TrustedNetwork,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelConfig {
    #[serde(default = "default_tunnel_package")]
    pub app_package: String,
    #[serde(default = "default_tunnel_activity")]
    pub app_activity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_timeout_ms")]
    pub connect_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub auth_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub read_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub write_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Accept self-signed listener certificates
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl WakeGateConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identity.alias.trim().is_empty() {
            return Err(ConfigError::Validation("identity alias must not be empty".into()));
        }
        if self.identity.key_size_bits < MIN_KEY_SIZE_BITS {
            return Err(ConfigError::Validation(format!(
                "key_size_bits {} below minimum {}",
                self.identity.key_size_bits, MIN_KEY_SIZE_BITS
            )));
        }
        if self.identity.comment.chars().any(char::is_whitespace) {
            return Err(ConfigError::Validation(
                "identity comment must be a single token".into(),
            ));
        }
        for site in &self.sites {
            site.validate()?;
        }
        // Builds the table to surface duplicate ids
        self.site_table().map(|_| ())
    }

    pub fn site_table(&self) -> Result<SiteTable, ConfigError> {
        SiteTable::new(self.sites.iter().cloned())
    }
}

impl Default for WakeGateConfig {
    fn default() -> Self {
        Self {
            identity: IdentityConfig::default(),
            network: NetworkConfig::default(),
            tunnel: TunnelConfig::default(),
            timeouts: TimeoutConfig::default(),
            http: HttpConfig::default(),
            sites: default_sites(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            alias: default_alias(),
            comment: default_comment(),
            key_size_bits: default_key_size(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ssid_wait_ms: default_ssid_wait(),
            max_generation_retries: default_generation_retries(),
            home: default_home(),
            work: TrustedNetwork::default(),
        }
    }
}

impl NetworkConfig {
    pub fn ssid_wait(&self) -> Duration {
        Duration::from_millis(self.ssid_wait_ms)
    }
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            app_package: default_tunnel_package(),
            app_activity: default_tunnel_activity(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_timeout_ms(),
            auth_ms: default_timeout_ms(),
            read_ms: default_timeout_ms(),
            write_ms: default_timeout_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn auth(&self) -> Duration {
        Duration::from_millis(self.auth_ms)
    }

    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }

    pub fn write(&self) -> Duration {
        Duration::from_millis(self.write_ms)
    }
}

fn default_alias() -> String {
    "wakegate-device".to_string()
}

fn default_comment() -> String {
    "android_device".to_string()
}

fn default_key_size() -> u32 {
    MIN_KEY_SIZE_BITS
}

fn default_ssid_wait() -> u64 {
    3_000
}

fn default_generation_retries() -> u32 {
    3
}

fn default_home() -> TrustedNetwork {
    TrustedNetwork {
        ssid: None,
        subnet: "10.0.0.0/24".parse().ok(),
    }
}

fn default_tunnel_package() -> String {
    "com.wireguard.android".to_string()
}

fn default_tunnel_activity() -> String {
    "com.wireguard.android.activity.MainActivity".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_sites() -> Vec<Site> {
    vec![
        Site {
            id: "home".to_string(),
            display_name: "Computer Home".to_string(),
            local_endpoint: "10.0.0.3".to_string(),
            tunnel_endpoint: "10.8.0.3".to_string(),
            hardware_id: "00:00:00:00:00:00".to_string(),
            action: SiteAction::Shell {
                username: "wol".to_string(),
                command: "bash WOL_Curdin_Machine.sh".to_string(),
                port: 22,
                host_key_fingerprint: None,
            },
        },
        Site {
            id: "workstation".to_string(),
            display_name: "Workstation".to_string(),
            local_endpoint: "10.0.0.4".to_string(),
            tunnel_endpoint: "10.8.0.4".to_string(),
            hardware_id: "00:00:00:00:00:00".to_string(),
            action: SiteAction::Shell {
                username: "wol".to_string(),
                command: "bash WOL_SA_Workstation.sh".to_string(),
                port: 22,
                host_key_fingerprint: None,
            },
        },
    ]
}
