//! Unit tests for the fleet controller services.
//!
//! These tests run against the in-memory adapters and need no external I/O.

mod change_tracking;
mod config_sync;
mod desired_state;
mod provisioning;
