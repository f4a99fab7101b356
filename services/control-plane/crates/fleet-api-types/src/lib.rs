//! Request and response bodies exchanged between agents and the control plane.
//!
//! All bodies are JSON with camelCase field names. Partial-update bodies use
//! `Option` for every field; an absent field leaves the stored value untouched.

pub mod changes;
pub mod config;
pub mod error;
pub mod inventory;
pub mod microservice;
pub mod provision;
pub mod status;

pub use changes::ChangesResponse;
pub use config::{AgentConfig, AgentConfigUpdate};
pub use error::ErrorBody;
pub use inventory::{
    DiagnosticReport, HardwareInfo, ImageSnapshotResponse, RegistriesResponse,
    RegistryDescriptor, StraceEntry, StraceTarget, StraceTargetsResponse, StraceUpdate,
    TunnelDescriptor, TunnelResponse, UsbInfo, VersionCommandResponse,
};
pub use microservice::{
    MicroserviceDescriptor, MicroserviceResponse, MicroservicesResponse, PortMapping,
    VolumeMapping,
};
pub use provision::{ProvisionRequest, ProvisionResponse};
pub use status::AgentStatusUpdate;
