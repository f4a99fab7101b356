//! Thin axum adapter over the application services.

pub mod error;
pub mod handlers;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the agent API router. `snapshot_max_bytes` bounds image uploads;
/// every other body keeps axum's default limit.
pub fn router(state: AppState, snapshot_max_bytes: usize) -> Router {
    let agent = Router::new()
        .route("/{node_id}", delete(handlers::deregister))
        .route(
            "/{node_id}/config",
            get(handlers::get_config).patch(handlers::update_config),
        )
        .route("/{node_id}/config/changes", get(handlers::drain_changes))
        .route("/{node_id}/status", put(handlers::update_status))
        .route("/{node_id}/microservices", get(handlers::microservices))
        .route(
            "/{node_id}/microservices/{workload_id}",
            get(handlers::microservice),
        )
        .route("/{node_id}/registries", get(handlers::registries))
        .route("/{node_id}/tunnel", get(handlers::tunnel))
        .route(
            "/{node_id}/strace",
            get(handlers::strace_targets).put(handlers::strace_upload),
        )
        .route("/{node_id}/version", get(handlers::version))
        .route("/{node_id}/hal/hw", put(handlers::hardware_info))
        .route("/{node_id}/hal/usb", put(handlers::usb_info))
        .route(
            "/{node_id}/image-snapshot",
            get(handlers::image_snapshot).put(handlers::image_snapshot_upload).layer(
                DefaultBodyLimit::max(snapshot_max_bytes),
            ),
        )
        .route("/provision", post(handlers::provision));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v3/agent", agent)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
