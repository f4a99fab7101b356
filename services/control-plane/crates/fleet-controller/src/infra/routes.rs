//! Route table held in memory, keyed by source workload id.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::ports::{RouteResolver, StoreResult};
use crate::domain::Workload;

/// Routes configured by the operator. A workload without an entry publishes nowhere.
#[derive(Debug, Default)]
pub struct StaticRoutes {
    table: RwLock<HashMap<String, Vec<String>>>,
}

impl StaticRoutes {
    #[must_use]
    pub fn new(table: HashMap<String, Vec<String>>) -> Self {
        Self {
            table: RwLock::new(table),
        }
    }

    /// Replace the destinations of `workload`; an empty list removes the entry.
    pub fn set(&self, workload: &str, destinations: Vec<String>) {
        let mut table = self.table.write();
        if destinations.is_empty() {
            table.remove(workload);
        } else {
            table.insert(workload.to_string(), destinations);
        }
    }
}

#[async_trait]
impl RouteResolver for StaticRoutes {
    async fn routes_for(&self, workload: &Workload) -> StoreResult<Vec<String>> {
        Ok(self
            .table
            .read()
            .get(&workload.id)
            .cloned()
            .unwrap_or_default())
    }
}
