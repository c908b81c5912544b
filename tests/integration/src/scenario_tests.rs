//! End-to-end trigger scenarios across resolver, gate, router and dispatcher

use crate::test_utils::{http_site, spawn_wol_listener, Harness};
use axum::http::StatusCode;
use std::net::Ipv4Addr;
use wakegate_core::{ErrorKind, NetworkContext, TransportType, TrustLabel};
use wakegate_router::GateDecision;

#[tokio::test]
async fn scenario_a_trusted_local_routes_to_local_endpoint() {
    let harness = Harness::new(vec![]);
    let context = NetworkContext::new(Some(TransportType::Wifi), false, TrustLabel::TrustedLocalA);

    let route = harness.gate.router().route("home", &context).unwrap();
    assert_eq!(route.target_endpoint, "10.0.0.3");
    assert!(!route.via_tunnel);

    let outcome = harness.gate.dispatch("home", &context).await;
    assert!(outcome.succeeded, "{outcome:?}");
    assert_eq!(harness.remote.log.hosts(), vec!["10.0.0.3".to_string()]);
    assert!(harness.remote.log.all_closed());
}

#[tokio::test]
async fn scenario_b_unknown_with_tunnel_routes_to_tunnel_endpoint() {
    let harness = Harness::new(vec![]);
    let context = NetworkContext::new(Some(TransportType::Cellular), true, TrustLabel::Unknown);

    let route = harness.gate.router().route("home", &context).unwrap();
    assert_eq!(route.target_endpoint, "10.8.0.3");
    assert!(route.via_tunnel);

    let outcome = harness.gate.dispatch("home", &context).await;
    assert!(outcome.succeeded);
    assert_eq!(harness.remote.log.hosts(), vec!["10.8.0.3".to_string()]);
}

#[tokio::test]
async fn scenario_c_untrusted_requires_tunnel_and_never_dispatches() {
    let harness = Harness::new(vec![]);
    let context = NetworkContext::new(Some(TransportType::Wifi), false, TrustLabel::Unknown);

    assert_eq!(harness.gate.evaluate_trust(&context), GateDecision::RequireTunnel);
    assert!(harness.gate.router().route("home", &context).is_err());

    let outcome = harness.gate.dispatch("home", &context).await;
    assert_eq!(outcome.error_kind, Some(ErrorKind::RequireTunnel));
    assert_eq!(harness.remote.log.opened(), 0);
}

#[tokio::test]
async fn scenario_d_locked_keystore_closes_connection() {
    let harness = Harness::new(vec![]);
    harness.keystore.lock();
    let context = NetworkContext::new(Some(TransportType::Wifi), false, TrustLabel::TrustedLocalA);

    let outcome = harness.gate.dispatch("home", &context).await;
    assert!(!outcome.succeeded);
    assert_eq!(outcome.error_kind, Some(ErrorKind::KeyUnavailable));
    assert_eq!(harness.remote.log.opened(), 1);
    assert!(harness.remote.log.all_closed());
    assert!(harness.remote.log.executed.lock().unwrap().is_empty());

    // Recoverable: unlocking and re-triggering works
    harness.keystore.unlock();
    let outcome = harness.gate.dispatch("home", &context).await;
    assert!(outcome.succeeded);
}

#[tokio::test]
async fn scenario_e_http_500_is_remote_rejection() {
    let (base, requests) = spawn_wol_listener(StatusCode::INTERNAL_SERVER_ERROR).await;
    let harness = Harness::new(vec![http_site("nas", &base)]);
    let context = NetworkContext::new(Some(TransportType::Wifi), false, TrustLabel::TrustedLocalB);

    let outcome = harness.gate.dispatch("nas", &context).await;
    assert!(!outcome.succeeded);
    assert_eq!(outcome.error_kind, Some(ErrorKind::RemoteRejected));
    assert_eq!(outcome.status_code, Some(500));

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0],
        serde_json::json!({"mac": "AA:BB:CC:DD:EE:FF", "ip": "10.0.0.255", "port": 9})
    );
}

#[tokio::test]
async fn trigger_runs_full_pipeline_on_home_subnet() {
    let harness = Harness::new(vec![]);
    harness.join_ethernet(Ipv4Addr::new(10, 0, 0, 21), false);

    let report = harness.gate.trigger("workstation").await;
    assert!(report.outcome.succeeded);
    assert_eq!(report.outcome.message, "ran bash WOL_SA_Workstation.sh");

    let executed = harness.remote.log.executed.lock().unwrap();
    assert_eq!(
        *executed,
        vec![("wol".to_string(), "bash WOL_SA_Workstation.sh".to_string())]
    );
}

#[tokio::test]
async fn trigger_re_resolves_after_tunnel_activation() {
    let harness = Harness::new(vec![]);
    harness.join_ethernet(Ipv4Addr::new(192, 168, 44, 7), false);

    let blocked = harness.gate.trigger("home").await;
    assert_eq!(blocked.outcome.error_kind, Some(ErrorKind::RequireTunnel));
    assert!(blocked.tunnel_prompt.is_some());

    // User opens the tunnel app; the next trigger sees a new context
    harness.join_ethernet(Ipv4Addr::new(192, 168, 44, 7), true);
    let report = harness.gate.trigger("home").await;
    assert!(report.outcome.succeeded);
    assert!(report.context.unwrap().tunnel_active());
    assert_eq!(harness.remote.log.hosts(), vec!["10.8.0.3".to_string()]);
}

#[tokio::test]
async fn spawn_dispatch_http_success_on_home_subnet() {
    let (base, requests) = spawn_wol_listener(StatusCode::OK).await;
    let harness = Harness::new(vec![http_site("nas", &base)]);
    harness.join_ethernet(Ipv4Addr::new(10, 0, 0, 30), false);

    let report = harness.gate.spawn_dispatch("nas").await.unwrap();
    assert!(report.outcome.succeeded);
    assert_eq!(report.outcome.message, "done");
    assert_eq!(requests.lock().unwrap().len(), 1);
    assert_eq!(harness.remote.log.opened(), 0);
}
