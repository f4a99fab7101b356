//! Shared handler state: the ports every request is served through.

use std::sync::Arc;

use crate::application::ports::{ChangeTracker, FleetStore, RouteResolver, SnapshotArchive};
use crate::application::services::ProvisioningPolicy;
use crate::application::services::operations::FleetOperations;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn FleetStore>,
    pub changes: Arc<dyn ChangeTracker>,
    pub routes: Arc<dyn RouteResolver>,
    pub snapshots: Arc<dyn SnapshotArchive>,
    pub policy: ProvisioningPolicy,
}

impl AppState {
    /// Operator write paths over the same ports.
    #[must_use]
    pub fn operations(&self) -> FleetOperations<'_> {
        FleetOperations::new(&*self.store, &*self.changes, self.policy)
    }
}
