//! Transport routing
//!
//! Maps a site and a resolved context onto a [`RouteDecision`]. The
//! transport kind is fixed per site; only the endpoint depends on trust.

use thiserror::Error;
use tracing::{debug, warn};
use wakegate_core::{ErrorKind, NetworkContext, RouteDecision, Site, SiteTable, TrustLabel};

/// Routing errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("Unknown site: {0}")]
    UnknownSite(String),

    /// No trusted path to the site; the trust gate should have blocked this
    #[error("No trusted path to site {site_id} (trust label {trust_label}, tunnel inactive)")]
    Untrusted {
        site_id: String,
        trust_label: TrustLabel,
    },
}

impl RouteError {
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            RouteError::UnknownSite(_) => ErrorKind::Configuration,
            RouteError::Untrusted { .. } => ErrorKind::RequireTunnel,
        }
    }
}

/// Deterministic site router.
#[derive(Debug, Clone)]
pub struct TransportRouter {
    sites: SiteTable,
}

impl TransportRouter {
    pub fn new(sites: SiteTable) -> Self {
        Self { sites }
    }

    pub fn site(&self, site_id: &str) -> Result<&Site, RouteError> {
        self.sites
            .get(site_id)
            .map_err(|_| RouteError::UnknownSite(site_id.to_string()))
    }

    pub fn sites(&self) -> &SiteTable {
        &self.sites
    }

    /// Pick transport and endpoint for `site_id` under `context`.
    ///
    /// Trusted-local labels use the local endpoint. An explicit tunnel label,
    /// or an unknown label with an active tunnel, uses the tunnel endpoint.
    pub fn route(&self, site_id: &str, context: &NetworkContext) -> Result<RouteDecision, RouteError> {
        let site = self.site(site_id)?;
        let label = context.trust_label();

        let via_tunnel = match label {
            TrustLabel::TrustedLocalA | TrustLabel::TrustedLocalB => false,
            TrustLabel::Tunnel => true,
            TrustLabel::Unknown if context.tunnel_active() => true,
            TrustLabel::Unknown => {
                warn!(site = site_id, "route requested without a trusted path");
                return Err(RouteError::Untrusted {
                    site_id: site_id.to_string(),
                    trust_label: label,
                });
            }
        };

        let target_endpoint = if via_tunnel {
            &site.tunnel_endpoint
        } else {
            &site.local_endpoint
        };

        debug!(
            site = site_id,
            endpoint = %target_endpoint,
            trust_label = %label,
            via_tunnel,
            "route selected"
        );

        Ok(RouteDecision {
            site_id: site.id.clone(),
            transport_kind: site.transport_kind(),
            target_endpoint: target_endpoint.clone(),
            reason: label,
            via_tunnel,
        })
    }
}
