//! Integration tests for the fleet controller.
//!
//! `http_api` drives the full axum router in-process. `valkey_tracker`
//! needs a live Valkey and is ignored by default; run it with
//! `cargo test -p fleet-controller --test integration -- --ignored`.

mod http_api;
