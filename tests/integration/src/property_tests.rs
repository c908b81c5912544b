//! Cross-component properties: identity idempotence, key export round trip,
//! and the gate/router composition.

use crate::test_utils::Harness;
use proptest::prelude::*;
use std::sync::Arc;
use wakegate_core::{NetworkContext, TransportType, TrustLabel, WakeGateConfig};
use wakegate_identity::{parse_authorized_key, KeySpec, KeyVault, SoftwareKeystore};
use wakegate_router::{GateDecision, TransportRouter, TrustGate};

#[test]
fn ensure_identity_is_idempotent_per_alias() {
    let store = Arc::new(SoftwareKeystore::new());
    let vault = KeyVault::new(store, KeySpec::signing(2048), "android_device");

    for alias in ["wakegate-device", "secondary"] {
        let first = vault.ensure_identity(alias).unwrap();
        let second = vault.ensure_identity(alias).unwrap();
        assert_eq!(first.public_key, second.public_key);
        assert_eq!(vault.public_key(alias).unwrap(), first.public_key);
    }
}

#[test]
fn exported_text_round_trips_to_raw_key() {
    let harness = Harness::new(vec![]);
    let identity = harness.gate.ensure_identity().unwrap();

    let text = harness.gate.public_key_text().unwrap();
    let parsed = parse_authorized_key(&text).unwrap();
    assert_eq!(parsed.raw, identity.public_key.raw());
    assert_eq!(parsed.comment, "android_device");
}

fn label() -> impl Strategy<Value = TrustLabel> {
    prop::sample::select(TrustLabel::ALL.to_vec())
}

fn transport() -> impl Strategy<Value = Option<TransportType>> {
    prop::option::of(prop::sample::select(vec![
        TransportType::Wifi,
        TransportType::Cellular,
        TransportType::Ethernet,
        TransportType::Other,
    ]))
}

proptest! {
    #[test]
    fn router_never_routes_what_the_gate_blocks(
        label in label(),
        tunnel_active in any::<bool>(),
        transport in transport(),
    ) {
        let config = WakeGateConfig::default();
        let gate = TrustGate::new(&config.tunnel);
        let router = TransportRouter::new(config.site_table().unwrap());
        let context = NetworkContext::new(transport, tunnel_active, label);

        let decision = gate.evaluate(&context);
        prop_assert_eq!(
            decision == GateDecision::Proceed,
            label != TrustLabel::Unknown || tunnel_active
        );
        for site in ["home", "workstation"] {
            let route = router.route(site, &context);
            if decision == GateDecision::RequireTunnel {
                prop_assert!(route.is_err());
            } else {
                let route = route.unwrap();
                prop_assert_eq!(route.reason, label);
            }
        }
    }
}
