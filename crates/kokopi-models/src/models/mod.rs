//! Data models for our application to interact with
pub mod deployments;
pub mod env;
pub mod tenants;

pub use deployments::{
    DeleteStatus, DeployRequest, DeployResponse, DeleteResponse, HostConfig, PatchEnvRequest,
    PortConfig, RedeployRequest,
};
pub use env::EnvEntry;
pub use tenants::{PodSummary, TenantOverview, TenantSummary, WorkloadSummary};
