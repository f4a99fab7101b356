//! Tests for partial config and status merges.

#![allow(clippy::expect_used)]

use fleet_api_types::{AgentConfigUpdate, AgentStatusUpdate};
use fleet_common::GpsMode;
use fleet_controller::application::services::changes::drain;
use fleet_controller::application::services::sync::{get_config, update_config, update_status};
use fleet_controller::domain::NodeConfig;
use fleet_controller::error::ErrorKind;

use crate::fixtures::{Fixture, node_id};

#[tokio::test]
async fn single_field_update_leaves_others_untouched() {
    let fx = Fixture::new().await;
    let node = node_id("edge-1");
    let update: AgentConfigUpdate = serde_json::from_str(r#"{"cpuLimit":2}"#).expect("json");

    let changed = update_config(&*fx.state.store, &node, &update)
        .await
        .expect("update");
    assert!(changed);

    let config = get_config(&*fx.state.store, &node).await.expect("config");
    let defaults = NodeConfig::default();
    assert_eq!(config.cpu_limit, 2.0);
    assert_eq!(config.memory_limit, defaults.memory_limit);
    assert_eq!(config.docker_url, defaults.docker_url);
    assert_eq!(config.log_directory, defaults.log_directory);
}

#[tokio::test]
async fn gps_mode_is_stored_but_not_served() {
    let fx = Fixture::new().await;
    let node = node_id("edge-1");
    let update = AgentConfigUpdate {
        gps_mode: Some(GpsMode::Manual),
        latitude: Some(52.37),
        longitude: Some(4.89),
        ..AgentConfigUpdate::default()
    };
    update_config(&*fx.state.store, &node, &update)
        .await
        .expect("update");

    let records = fx.store.snapshot().await;
    let stored = &records.nodes[&node];
    assert_eq!(stored.config.gps_mode, GpsMode::Manual);
    let served = serde_json::to_value(get_config(&*fx.state.store, &node).await.expect("config"))
        .expect("json");
    assert!(served.get("gpsMode").is_none());
    assert_eq!(served["latitude"], 52.37);
}

#[tokio::test]
async fn agent_sync_does_not_mark_change_flags() {
    let fx = Fixture::new().await;
    let node = node_id("edge-1");
    update_config(
        &*fx.state.store,
        &node,
        &AgentConfigUpdate {
            cpu_limit: Some(5.0),
            ..AgentConfigUpdate::default()
        },
    )
    .await
    .expect("update");
    let response = drain(&*fx.state.changes, &node).await.expect("drain");
    assert!(!response.config);
}

#[tokio::test]
async fn invalid_config_is_rejected_before_any_write() {
    let fx = Fixture::new().await;
    let node = node_id("edge-1");
    let err = update_config(
        &*fx.state.store,
        &node,
        &AgentConfigUpdate {
            cpu_limit: Some(250.0),
            memory_limit: Some(1.0),
            ..AgentConfigUpdate::default()
        },
    )
    .await
    .expect_err("cpu limit out of range");
    assert_eq!(err.kind(), ErrorKind::Validation);
    let records = fx.store.snapshot().await;
    let stored = &records.nodes[&node];
    assert_eq!(stored.config.memory_limit, NodeConfig::default().memory_limit);
}

#[tokio::test]
async fn status_update_merges_present_fields() {
    let fx = Fixture::new().await;
    let node = node_id("edge-1");
    update_status(
        &*fx.state.store,
        &node,
        &AgentStatusUpdate {
            daemon_status: Some("RUNNING".to_string()),
            version: Some("3.1.0".to_string()),
            ..AgentStatusUpdate::default()
        },
    )
    .await
    .expect("first status");
    update_status(
        &*fx.state.store,
        &node,
        &AgentStatusUpdate {
            cpu_usage: Some(37.5),
            is_ready_to_upgrade: Some(true),
            ..AgentStatusUpdate::default()
        },
    )
    .await
    .expect("second status");

    let records = fx.store.snapshot().await;
    let status = &records.nodes[&node].status;
    assert_eq!(status.daemon_status, "RUNNING");
    assert_eq!(status.version, "3.1.0");
    assert_eq!(status.cpu_usage, 37.5);
    assert!(status.is_ready_to_upgrade);
}

#[tokio::test]
async fn status_for_unknown_node_is_not_found() {
    let fx = Fixture::new().await;
    let err = update_status(&*fx.state.store, &node_id("ghost"), &AgentStatusUpdate::default())
        .await
        .expect_err("unknown node");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
