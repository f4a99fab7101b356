//! Application layer: port trait definitions and use-case orchestration.
//!
//! This module depends only on `crate::domain` and `crate::error`, never on
//! `crate::infra` or `crate::http`.

pub mod ports;
pub mod services;

pub use ports::{
    ByteStream, ChangeTracker, FleetStore, FleetTx, RouteResolver, SnapshotArchive, StoreResult,
};
