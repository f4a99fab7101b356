//! Tests for desired-state resolution.

#![allow(clippy::expect_used)]

use fleet_common::NodeType;
use fleet_controller::application::services::desired_state::{workload, workloads};
use fleet_controller::error::{ControllerError, ErrorKind, Missing};

use crate::fixtures::{Fixture, node_id, records, workload as make_workload};

#[tokio::test]
async fn resolves_variant_registry_and_routes() {
    let fx = Fixture::new().await;
    let response = workloads(&*fx.state.store, &*fx.state.routes, &node_id("edge-1"))
        .await
        .expect("resolve");

    let ids: Vec<_> = response.microservices.iter().map(|m| m.uuid.as_str()).collect();
    assert_eq!(ids, ["wl-bridge", "wl-camera"]);

    let bridge = &response.microservices[0];
    assert_eq!(bridge.image_id, "bridge:x86");
    assert_eq!(bridge.registry_url, "registry-1.example.com");
    assert_eq!(bridge.routes, ["wl-camera"]);

    let camera = &response.microservices[1];
    assert_eq!(camera.image_id, "camera:x86");
    assert_eq!(camera.registry_url, "registry-2.example.com");
    assert!(camera.routes.is_empty());
}

#[tokio::test]
async fn unmatched_variant_is_kept_with_empty_artifact() {
    let mut records = records();
    records
        .nodes
        .get_mut(&node_id("edge-1"))
        .expect("edge-1")
        .node_type = NodeType::Arm;
    let fx = Fixture::with_records(records).await;

    let response = workloads(&*fx.state.store, &*fx.state.routes, &node_id("edge-1"))
        .await
        .expect("resolve");
    assert_eq!(response.microservices.len(), 2);
    assert_eq!(response.microservices[0].image_id, "bridge:arm");
    assert_eq!(response.microservices[1].uuid, "wl-camera");
    assert_eq!(response.microservices[1].image_id, "");
}

#[tokio::test]
async fn node_without_workloads_resolves_empty() {
    let fx = Fixture::new().await;
    let response = workloads(&*fx.state.store, &*fx.state.routes, &node_id("edge-2"))
        .await
        .expect("resolve");
    assert!(response.microservices.is_empty());
}

#[tokio::test]
async fn unknown_node_is_not_found() {
    let fx = Fixture::new().await;
    let err = workloads(&*fx.state.store, &*fx.state.routes, &node_id("ghost"))
        .await
        .expect_err("unknown node");
    assert!(matches!(err, ControllerError::NotFound(Missing::Node(_))));
}

#[tokio::test]
async fn single_workload_uses_same_rules() {
    let fx = Fixture::new().await;
    let response = workload(&*fx.state.store, &*fx.state.routes, &node_id("edge-1"), "wl-bridge")
        .await
        .expect("resolve");
    assert_eq!(response.microservice.image_id, "bridge:x86");
    assert_eq!(response.microservice.routes, ["wl-camera"]);
}

#[tokio::test]
async fn single_workload_on_other_node_is_not_found() {
    let fx = Fixture::new().await;
    let err = workload(&*fx.state.store, &*fx.state.routes, &node_id("edge-2"), "wl-bridge")
        .await
        .expect_err("not on edge-2");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn missing_registry_is_not_found() {
    let mut records = records();
    records.registries.remove(&2);
    let fx = Fixture::with_records(records).await;

    let err = workloads(&*fx.state.store, &*fx.state.routes, &node_id("edge-1"))
        .await
        .expect_err("camera registry gone");
    assert!(matches!(err, ControllerError::NotFound(Missing::Registry(2))));
}

#[tokio::test]
async fn route_changes_are_visible_on_next_fetch() {
    let fx = Fixture::new().await;
    let mut records = fx.store.snapshot().await;
    let extra = make_workload("wl-sink", "sink", "edge-1", 10);
    records.workloads.insert(extra.id.clone(), extra);
    let fx = Fixture::with_records(records).await;
    fx.routes.set("wl-camera", vec!["wl-sink".to_string()]);

    let response = workload(&*fx.state.store, &*fx.state.routes, &node_id("edge-1"), "wl-camera")
        .await
        .expect("resolve");
    assert_eq!(response.microservice.routes, ["wl-sink"]);
}
