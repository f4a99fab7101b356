//! Fleet controller entry point.
//!
//! Initialises tracing, loads configuration from `FLEET_*` environment
//! variables, wires the store, change tracker, route table and snapshot
//! archive, and serves the agent API.

use std::sync::Arc;

use anyhow::{Context, Result};
use fleet_common::ControllerConfig;
use tracing_subscriber::EnvFilter;

use fleet_controller::application::ports::ChangeTracker;
use fleet_controller::application::services::ProvisioningPolicy;
use fleet_controller::http;
use fleet_controller::infra::{
    FleetRecords, FleetSeed, FsSnapshotArchive, MemoryChangeTracker, MemoryStore, StaticRoutes,
    ValkeyChangeTracker,
};
use fleet_controller::state::AppState;

async fn change_tracker(config: &ControllerConfig) -> Result<Arc<dyn ChangeTracker>> {
    if config.valkey_url.is_none() {
        tracing::info!("using in-process change tracking");
        return Ok(Arc::new(MemoryChangeTracker::new()));
    }
    let password = match &config.valkey_pass_file {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read password from {}", path.display()))?
                .trim()
                .to_string(),
        ),
        None => None,
    };
    let tracker = ValkeyChangeTracker::connect(config, password)
        .await
        .context("failed to initialise Valkey connection")?;
    Ok(Arc::new(tracker))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("fleet-controller starting");

    let config: ControllerConfig = envy::prefixed("FLEET_")
        .from_env()
        .context("failed to load config from FLEET_* env vars")?;
    let policy = ProvisioningPolicy::from_config(&config).context("invalid credential lifetimes")?;

    tracing::info!(
        listen_addr = %config.listen_addr,
        snapshot_dir = %config.snapshot_dir.display(),
        valkey = config.valkey_url.is_some(),
        seeded = config.seed_file.is_some(),
        "configuration loaded",
    );

    let changes = change_tracker(&config).await?;

    let (records, routes) = match &config.seed_file {
        Some(path) => FleetSeed::load(path)?.into_records()?,
        None => (FleetRecords::default(), Default::default()),
    };
    for node in records.nodes.keys() {
        changes.register(node).await?;
    }
    tracing::info!(nodes = records.nodes.len(), workloads = records.workloads.len(), "store ready");

    let state = AppState {
        store: Arc::new(MemoryStore::new(records)),
        changes,
        routes: Arc::new(StaticRoutes::new(routes)),
        snapshots: Arc::new(FsSnapshotArchive::new(config.snapshot_dir.clone())),
        policy,
    };
    let router = http::router(state, config.snapshot_max_bytes);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .context("failed to bind TCP listener")?;
    tracing::info!("agent API ready on http://{}/api/v3/agent", config.listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("fleet-controller shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) for graceful shutdown.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
