//! Tests for the provisioning handshake.

#![allow(clippy::expect_used)]

use fleet_api_types::ProvisionRequest;
use chrono::TimeDelta;
use fleet_common::{ControllerConfig, NodeType};
use fleet_controller::application::services::ProvisioningPolicy;
use fleet_controller::application::services::provisioning::provision;
use fleet_controller::domain::token_digest;
use fleet_controller::error::{ControllerError, ErrorKind, Missing, ValidationError};

use crate::fixtures::{EXPIRED_KEY, Fixture, VALID_KEY, node_id};

fn request(key: &str, node_type: NodeType) -> ProvisionRequest {
    ProvisionRequest {
        key: key.to_string(),
        node_type,
    }
}

#[tokio::test]
async fn redeeming_key_rotates_token_and_consumes_key() {
    let fx = Fixture::new().await;
    let response = provision(&*fx.state.store, &fx.state.policy, &request(VALID_KEY, NodeType::X86))
        .await
        .expect("provision");

    assert_eq!(response.node_id, node_id("edge-1"));
    let records = fx.store.snapshot().await;
    assert!(!records.provision_keys.contains_key(VALID_KEY));
    let token = &records.access_tokens[&node_id("edge-1")];
    assert_eq!(token.digest, token_digest(&response.token));
}

#[tokio::test]
async fn second_redemption_is_not_found() {
    let fx = Fixture::new().await;
    provision(&*fx.state.store, &fx.state.policy, &request(VALID_KEY, NodeType::X86))
        .await
        .expect("first redemption");

    let err = provision(&*fx.state.store, &fx.state.policy, &request(VALID_KEY, NodeType::X86))
        .await
        .expect_err("second redemption must fail");
    assert!(matches!(err, ControllerError::NotFound(Missing::ProvisionKey)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redemptions_succeed_exactly_once() {
    let fx = Fixture::new().await;
    let attempts = (0..8).map(|_| {
        let state = fx.state.clone();
        tokio::spawn(async move {
            provision(&*state.store, &state.policy, &request(VALID_KEY, NodeType::X86)).await
        })
    });
    let mut ok = 0;
    for attempt in attempts.collect::<Vec<_>>() {
        match attempt.await.expect("join") {
            Ok(_) => ok += 1,
            Err(err) => assert_eq!(err.kind(), ErrorKind::NotFound),
        }
    }
    assert_eq!(ok, 1);
}

#[tokio::test]
async fn expired_key_is_authentication_error() {
    let fx = Fixture::new().await;
    let err = provision(&*fx.state.store, &fx.state.policy, &request(EXPIRED_KEY, NodeType::Arm))
        .await
        .expect_err("expired key");
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert!(fx.store.snapshot().await.provision_keys.contains_key(EXPIRED_KEY));
}

#[tokio::test]
async fn unknown_key_is_not_found() {
    let fx = Fixture::new().await;
    let err = provision(&*fx.state.store, &fx.state.policy, &request("ffffffffffffffff", NodeType::X86))
        .await
        .expect_err("unknown key");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn incompatible_type_names_offending_workloads_and_changes_nothing() {
    let fx = Fixture::new().await;
    let before = fx.store.snapshot().await;

    let err = provision(&*fx.state.store, &fx.state.policy, &request(VALID_KEY, NodeType::Arm))
        .await
        .expect_err("camera has no arm variant");
    match err {
        ControllerError::Validation(ValidationError::IncompatibleWorkloads { node_type, workloads }) => {
            assert_eq!(node_type, NodeType::Arm);
            assert_eq!(workloads, ["camera"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let after = fx.store.snapshot().await;
    assert!(after.provision_keys.contains_key(VALID_KEY));
    assert!(after.access_tokens.is_empty());
    assert_eq!(after.nodes, before.nodes);
}

#[tokio::test]
async fn compatible_type_change_is_applied() {
    let fx = Fixture::new().await;
    fx.ops().remove_workload("wl-camera").await.expect("remove camera");

    provision(&*fx.state.store, &fx.state.policy, &request(VALID_KEY, NodeType::Arm))
        .await
        .expect("bridge has an arm variant");
    let records = fx.store.snapshot().await;
    assert_eq!(records.nodes[&node_id("edge-1")].node_type, NodeType::Arm);
}

#[tokio::test]
async fn reprovisioning_replaces_previous_token() {
    let fx = Fixture::new().await;
    let first = provision(&*fx.state.store, &fx.state.policy, &request(VALID_KEY, NodeType::X86))
        .await
        .expect("first");
    let key = fx
        .ops()
        .issue_provision_key(&node_id("edge-1"))
        .await
        .expect("new key");
    let second = provision(&*fx.state.store, &fx.state.policy, &request(&key.key, NodeType::X86))
        .await
        .expect("second");

    assert_ne!(first.token, second.token);
    let records = fx.store.snapshot().await;
    assert_eq!(records.access_tokens.len(), 1);
    assert_eq!(
        records.access_tokens[&node_id("edge-1")].digest,
        token_digest(&second.token)
    );
}

#[tokio::test]
async fn unspecified_type_is_rejected() {
    let fx = Fixture::new().await;
    let err = provision(
        &*fx.state.store,
        &fx.state.policy,
        &request(VALID_KEY, NodeType::Unspecified),
    )
    .await
    .expect_err("type 0");
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn unrepresentable_token_lifetime_is_rejected_at_startup() {
    let config = ControllerConfig {
        access_token_ttl_secs: 100_000_000_000_000,
        ..ControllerConfig::default()
    };
    let err = ProvisioningPolicy::from_config(&config).expect_err("expiry overflows");
    assert!(matches!(
        err,
        ValidationError::Field {
            field: "access_token_ttl_secs",
            ..
        }
    ));
}

#[tokio::test]
async fn oversized_lifetime_still_provisions() {
    let fx = Fixture::new().await;
    let policy = ProvisioningPolicy {
        access_token_ttl: TimeDelta::seconds(100_000_000_000_000),
        ..fx.state.policy
    };
    let response = provision(&*fx.state.store, &policy, &request(VALID_KEY, NodeType::X86))
        .await
        .expect("expiry clamps");
    assert_eq!(response.node_id, node_id("edge-1"));
}
