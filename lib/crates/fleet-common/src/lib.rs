pub mod config;
pub mod store_keys;
pub mod types;

pub use config::ControllerConfig;
pub use store_keys::{
    change_key, defaults, keys, snapshot, validate_node_id, validate_workload_id,
};
pub use types::*;
