//! Infrastructure adapters implementing the application ports.

pub mod memory;
pub mod routes;
pub mod seed;
pub mod snapshot;
pub mod valkey;

pub use memory::{FleetRecords, MemoryChangeTracker, MemoryStore};
pub use routes::StaticRoutes;
pub use seed::FleetSeed;
pub use snapshot::FsSnapshotArchive;
pub use valkey::ValkeyChangeTracker;
