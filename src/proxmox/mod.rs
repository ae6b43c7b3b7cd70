pub mod agent;
pub mod client;
pub mod error;
pub mod resource;
pub mod storage;
pub mod vm;

pub use client::{ProvisionDefaults, ProxmoxClient};
pub use error::ProxmoxError;
pub use resource::{
    CreateSpec, PowerAction, PowerState, Provisioned, ResourceDetails, ResourceKind,
    ResourceSummary, StorageItem,
};
