//! End-to-end agent flows through the HTTP router.

#![allow(clippy::expect_used)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use fleet_api_types::ErrorBody;
use fleet_common::{ChangeFlag, ChangeSet, NodeId};
use fleet_controller::application::ports::ChangeTracker;
use fleet_controller::application::services::ProvisioningPolicy;
use fleet_controller::http::router;
use fleet_controller::infra::{
    FleetSeed, FsSnapshotArchive, MemoryChangeTracker, MemoryStore, StaticRoutes,
};
use fleet_controller::state::AppState;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

const SEED: &str = r#"{
    "nodes": [
        { "id": "edge-1", "name": "Edge 1", "owner": "acme" },
        { "id": "edge-2", "name": "Edge 2", "owner": "acme" }
    ],
    "registries": [
        { "id": 1, "url": "registry.hub.docker.com", "owner": "", "isPublic": true },
        { "id": 2, "url": "registry.acme.internal", "owner": "acme" }
    ],
    "catalog": [
        { "id": 10, "name": "bridge", "registryId": 1,
          "variants": [{ "nodeType": 1, "image": "bridge:x86" }, { "nodeType": 2, "image": "bridge:arm" }] },
        { "id": 11, "name": "camera", "registryId": 2,
          "variants": [{ "nodeType": 1, "image": "camera:x86" }] }
    ],
    "workloads": [
        { "id": "wl-bridge", "name": "bridge", "nodeId": "edge-1", "catalogItemId": 10,
          "ports": [{ "portInternal": 1883, "portExternal": 11883 }] },
        { "id": "wl-camera", "name": "camera", "nodeId": "edge-1", "catalogItemId": 11,
          "imageSnapshot": "get_image" }
    ],
    "provisionKeys": [
        { "key": "a1b2c3d4e5f60718", "nodeId": "edge-1", "expiresAt": "2099-01-01T00:00:00Z" },
        { "key": "0123456789abcdef", "nodeId": "edge-2", "expiresAt": "2000-01-01T00:00:00Z" }
    ],
    "versionCommands": [{ "nodeId": "edge-1", "command": "upgrade" }],
    "routes": { "wl-bridge": ["wl-camera"] }
}"#;

struct Harness {
    app: Router,
    changes: Arc<MemoryChangeTracker>,
    _snapshots: TempDir,
}

async fn harness() -> Harness {
    let seed: FleetSeed = serde_json::from_str(SEED).expect("seed json");
    let (records, routes) = seed.into_records().expect("seed links");
    let changes = Arc::new(MemoryChangeTracker::new());
    for node in records.nodes.keys() {
        changes.register(node).await.expect("register");
    }
    let snapshots = tempfile::tempdir().expect("tempdir");
    let state = AppState {
        store: Arc::new(MemoryStore::new(records)),
        changes: changes.clone(),
        routes: Arc::new(StaticRoutes::new(routes)),
        snapshots: Arc::new(FsSnapshotArchive::new(snapshots.path())),
        policy: ProvisioningPolicy::default(),
    };
    Harness {
        app: router(state, 1024 * 1024),
        changes,
        _snapshots: snapshots,
    }
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

#[tokio::test]
async fn health_is_ok() {
    let h = harness().await;
    let (status, _) = send(&h.app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn provision_then_poll_then_fetch() {
    let h = harness().await;

    let (status, body) = send(
        &h.app,
        Method::POST,
        "/api/v3/agent/provision",
        Some(json!({ "key": "a1b2c3d4e5f60718", "type": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["nodeId"], "edge-1");
    assert_eq!(body["token"].as_str().map(str::len), Some(64));

    let (status, _) = send(
        &h.app,
        Method::POST,
        "/api/v3/agent/provision",
        Some(json!({ "key": "a1b2c3d4e5f60718", "type": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&h.app, Method::GET, "/api/v3/agent/edge-1/config/changes", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["microserviceList"], false);
    assert_eq!(body["isImageSnapshot"], false);

    let (status, body) = send(&h.app, Method::GET, "/api/v3/agent/edge-1/microservices", None).await;
    assert_eq!(status, StatusCode::OK);
    let services = body["microservices"].as_array().expect("array");
    assert_eq!(services.len(), 2);
    assert_eq!(services[0]["uuid"], "wl-bridge");
    assert_eq!(services[0]["imageId"], "bridge:x86");
    assert_eq!(services[0]["registryUrl"], "registry.hub.docker.com");
    assert_eq!(services[0]["routes"], json!(["wl-camera"]));
    assert_eq!(services[0]["portMappings"][0]["portExternal"], 11883);
}

#[tokio::test]
async fn provisioning_errors_map_to_status_codes() {
    let h = harness().await;

    let (status, body) = send(
        &h.app,
        Method::POST,
        "/api/v3/agent/provision",
        Some(json!({ "key": "0123456789abcdef", "type": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["name"], "AuthenticationError");

    let (status, body) = send(
        &h.app,
        Method::POST,
        "/api/v3/agent/provision",
        Some(json!({ "key": "a1b2c3d4e5f60718", "type": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorBody = serde_json::from_value(body).expect("error body");
    assert_eq!(error.name, "ValidationError");
    assert_eq!(error.details, ["camera"]);
}

#[tokio::test]
async fn changes_flow_from_tracker_to_agent_once() {
    let h = harness().await;
    let node = NodeId::new("edge-1").expect("id");
    h.changes
        .mark(&node, ChangeSet::from(ChangeFlag::Proxy), None)
        .await
        .expect("mark");

    let (_, first) = send(&h.app, Method::GET, "/api/v3/agent/edge-1/config/changes", None).await;
    assert_eq!(first["tunnel"], true);
    let (_, second) = send(&h.app, Method::GET, "/api/v3/agent/edge-1/config/changes", None).await;
    assert_eq!(second["tunnel"], false);

    let (status, body) = send(&h.app, Method::GET, "/api/v3/agent/ghost/config/changes", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["name"], "NotFoundError");
}

#[tokio::test]
async fn config_patch_is_partial() {
    let h = harness().await;
    let (status, _) = send(
        &h.app,
        Method::PATCH,
        "/api/v3/agent/edge-1/config",
        Some(json!({ "cpuLimit": 2, "gpsMode": "manual" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&h.app, Method::GET, "/api/v3/agent/edge-1/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cpuLimit"], 2.0);
    assert_eq!(body["dockerUrl"], "unix:///var/run/docker.sock");
    assert!(body.get("gpsMode").is_none());

    let (status, _) = send(
        &h.app,
        Method::PATCH,
        "/api/v3/agent/edge-1/config",
        Some(json!({ "latitude": 123.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_and_inventory_accept_partial_bodies() {
    let h = harness().await;
    let (status, _) = send(
        &h.app,
        Method::PUT,
        "/api/v3/agent/edge-1/status",
        Some(json!({ "daemonStatus": "RUNNING", "isReadyToUpgrade": true })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    for path in ["hal/hw", "hal/usb"] {
        let (status, _) = send(
            &h.app,
            Method::PUT,
            &format!("/api/v3/agent/edge-1/{path}"),
            Some(json!({ "info": "{}" })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}

#[tokio::test]
async fn auxiliary_reads() {
    let h = harness().await;

    let (_, body) = send(&h.app, Method::GET, "/api/v3/agent/edge-1/tunnel", None).await;
    assert_eq!(body["tunnel"], Value::Null);

    let (_, body) = send(&h.app, Method::GET, "/api/v3/agent/edge-1/registries", None).await;
    assert_eq!(body["registries"].as_array().map(Vec::len), Some(2));

    let (status, body) = send(&h.app, Method::GET, "/api/v3/agent/edge-1/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["versionCommand"], "upgrade");
    assert_eq!(body["provisionKey"].as_str().map(str::len), Some(16));

    let (status, _) = send(&h.app, Method::GET, "/api/v3/agent/edge-2/version", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &h.app,
        Method::PUT,
        "/api/v3/agent/edge-1/strace",
        Some(json!({ "straceData": [{ "microserviceUuid": "wl-bridge", "buffer": "open()" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applied"], 1);
}

#[tokio::test]
async fn image_snapshot_upload_round() {
    let h = harness().await;

    let (status, body) = send(&h.app, Method::GET, "/api/v3/agent/edge-1/image-snapshot", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uuid"], "wl-camera");

    let boundary = "fleet-boundary";
    let payload = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"upstream\"; filename=\"image.tar.gz\"\r\n\
         Content-Type: application/octet-stream\r\n\r\nIMAGEDATA\r\n--{boundary}--\r\n"
    );
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/api/v3/agent/edge-1/image-snapshot")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(payload))
        .expect("request");
    let response = h.app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = send(&h.app, Method::GET, "/api/v3/agent/edge-1/image-snapshot", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&h.app, Method::GET, "/api/v3/agent/edge-1/microservices/wl-camera", None).await;
    let path = body["microservice"]["imageSnapshot"].as_str().expect("path");
    assert!(path.ends_with(".tar.gz"));
    assert_eq!(std::fs::read(path).expect("archive"), b"IMAGEDATA");
}

#[tokio::test]
async fn deregistration_removes_node() {
    let h = harness().await;
    let (status, _) = send(&h.app, Method::DELETE, "/api/v3/agent/edge-1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&h.app, Method::GET, "/api/v3/agent/edge-1/config", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&h.app, Method::GET, "/api/v3/agent/edge-1/config/changes", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
