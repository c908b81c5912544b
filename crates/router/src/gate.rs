//! Trust gate for action authorization
//!
//! Decides from a resolved [`NetworkContext`] whether an action may proceed.
//! A path is acceptable when it is a known local network or when a tunnel is
//! active; anything else requires the user to bring up the tunnel first.
//! The gate keeps no state between evaluations.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use tracing::debug;
use wakegate_core::{NetworkContext, TrustLabel, TunnelConfig};

/// Gate verdict for one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    /// Trusted path, action may be routed and dispatched
    Proceed,
    /// No trusted path; the user must activate the tunnel and retry
    RequireTunnel,
}

impl GateDecision {
    /// Whether the action may continue
    pub fn is_proceed(&self) -> bool {
        matches!(self, GateDecision::Proceed)
    }
}

/// Companion tunnel application the user should open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelPrompt {
    /// Application package to launch
    pub app_package: String,
    /// Activity within the package
    pub app_activity: String,
}

impl From<&TunnelConfig> for TunnelPrompt {
    fn from(config: &TunnelConfig) -> Self {
        Self {
            app_package: config.app_package.clone(),
            app_activity: config.app_activity.clone(),
        }
    }
}

/// Trust gate for network path verification
#[derive(Debug, Clone)]
pub struct TrustGate {
    prompt: TunnelPrompt,
}

impl TrustGate {
    /// Create a gate that points users at the configured tunnel application
    pub fn new(tunnel: &TunnelConfig) -> Self {
        Self {
            prompt: TunnelPrompt::from(tunnel),
        }
    }

    /// Evaluate a resolved context
    ///
    /// Returns `Proceed` iff the trust label is known or a tunnel is active.
    pub fn evaluate(&self, context: &NetworkContext) -> GateDecision {
        let decision = Self::decide(context.trust_label(), context.tunnel_active());
        debug!(
            trust_label = %context.trust_label(),
            tunnel_active = context.tunnel_active(),
            ?decision,
            "trust gate evaluated"
        );
        decision
    }

    /// Prompt to show when the gate returns `RequireTunnel`
    pub fn tunnel_prompt(&self) -> &TunnelPrompt {
        &self.prompt
    }

    fn decide(label: TrustLabel, tunnel_active: bool) -> GateDecision {
        if label != TrustLabel::Unknown || tunnel_active {
            GateDecision::Proceed
        } else {
            GateDecision::RequireTunnel
        }
    }
}

impl Default for TrustGate {
    fn default() -> Self {
        Self::new(&TunnelConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wakegate_core::TransportType;

    fn context(label: TrustLabel, tunnel_active: bool) -> NetworkContext {
        NetworkContext::new(Some(TransportType::Wifi), tunnel_active, label)
    }

    #[test]
    fn test_full_label_tunnel_matrix() {
        let gate = TrustGate::default();
        for label in TrustLabel::ALL {
            for tunnel_active in [false, true] {
                let expected = if label == TrustLabel::Unknown && !tunnel_active {
                    GateDecision::RequireTunnel
                } else {
                    GateDecision::Proceed
                };
                assert_eq!(
                    gate.evaluate(&context(label, tunnel_active)),
                    expected,
                    "label={label} tunnel_active={tunnel_active}"
                );
            }
        }
    }

    #[test]
    fn test_disconnected_requires_tunnel() {
        let gate = TrustGate::default();
        assert_eq!(
            gate.evaluate(&NetworkContext::disconnected()),
            GateDecision::RequireTunnel
        );
    }

    #[test]
    fn test_prompt_from_config() {
        let tunnel = TunnelConfig {
            app_package: "org.example.vpn".to_string(),
            app_activity: "org.example.vpn.Main".to_string(),
        };
        let gate = TrustGate::new(&tunnel);
        assert_eq!(gate.tunnel_prompt().app_package, "org.example.vpn");
        assert_eq!(gate.tunnel_prompt().app_activity, "org.example.vpn.Main");
    }
}
