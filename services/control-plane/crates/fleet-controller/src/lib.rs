//! Fleet control plane: agent provisioning, change notification and
//! desired-state sync.
//!
//! Layering follows the dependency rule: `domain` has no I/O, `application`
//! defines ports and use cases over them, `infra` implements the ports and
//! `http` adapts the use cases to axum.

pub mod application;
pub mod domain;
pub mod error;
pub mod http;
pub mod infra;
pub mod state;

pub use error::{ControllerError, ErrorKind, Result};
pub use state::AppState;
