//! Compute Engine API access at the `v1` and `beta` levels.

pub mod beta;
mod client;
mod shared;
pub mod v1;

pub use client::{ComputeApi, ComputeClient};
pub use shared::{
    Address, AutoHealingPolicy, InstanceGroup, InstanceGroupManager, ManagedInstance, NamedPort,
    RecreateInstancesRequest, SetAutoHealingPoliciesRequest, SetInstanceTemplateRequest,
    SetNamedPortsRequest, SetTargetPoolsRequest, Zone,
};
