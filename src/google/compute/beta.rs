//! Compute Engine `beta` wire shapes.
//!
//! Shapes that are identical at both levels are re-exported from `v1`.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

pub use super::v1::{
    InstanceGroup, InstanceGroupManagersListManagedInstancesResponse,
    InstanceGroupManagersRecreateInstancesRequest, InstanceGroupManagersSetInstanceTemplateRequest,
    InstanceGroupManagersSetTargetPoolsRequest, InstanceGroupsSetNamedPortsRequest,
    ManagedInstance, NamedPort, Operation, OperationErrorItem, OperationErrors, Zone, ZoneList,
};

/// A regional static address with a caller-chosen IP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub address: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub region: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub self_link: String,
}

/// Autohealing policy of a managed group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstanceGroupManagerAutoHealingPolicy {
    pub health_check: String,
    pub initial_delay_sec: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstanceGroupManager {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub zone: String,
    pub base_instance_name: String,
    pub instance_template: String,
    pub target_size: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub target_pools: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub named_ports: Vec<NamedPort>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub auto_healing_policies: Vec<InstanceGroupManagerAutoHealingPolicy>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub fingerprint: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub instance_group: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub self_link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstanceGroupManagersSetAutoHealingRequest {
    pub auto_healing_policies: Vec<InstanceGroupManagerAutoHealingPolicy>,
}
