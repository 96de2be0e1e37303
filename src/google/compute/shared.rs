//! Level-independent Compute request and response types.
//!
//! Each type carries the union of the `v1` and `beta` fields and projects
//! to either wire shape. Projecting to `v1` drops beta-only fields.

use crate::error::OperationFault;
use crate::operation::{Operation, OperationStatus};

use super::{beta, v1};

/// A regional static address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    /// Address name.
    pub name: String,
    /// Reserved IP. Only sent and returned at beta.
    pub address: Option<String>,
    /// Region URL, as returned by the server.
    pub region: String,
    /// Server-assigned URL.
    pub self_link: String,
}

impl Address {
    /// Projects to the `v1` shape.
    #[must_use]
    pub fn to_production(&self) -> v1::Address {
        v1::Address {
            name: self.name.clone(),
            region: self.region.clone(),
            self_link: self.self_link.clone(),
            ..v1::Address::default()
        }
    }

    /// Projects to the `beta` shape.
    #[must_use]
    pub fn to_beta(&self) -> beta::Address {
        beta::Address {
            name: self.name.clone(),
            address: self.address.clone().unwrap_or_default(),
            region: self.region.clone(),
            self_link: self.self_link.clone(),
            ..beta::Address::default()
        }
    }

    /// Builds from a `v1` response.
    #[must_use]
    pub fn from_production(wire: v1::Address) -> Self {
        Self {
            name: wire.name,
            address: None,
            region: wire.region,
            self_link: wire.self_link,
        }
    }

    /// Builds from a `beta` response.
    #[must_use]
    pub fn from_beta(wire: beta::Address) -> Self {
        Self {
            name: wire.name,
            address: Some(wire.address).filter(|a| !a.is_empty()),
            region: wire.region,
            self_link: wire.self_link,
        }
    }
}

/// A named port on an instance group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedPort {
    /// Port name.
    pub name: String,
    /// Port number.
    pub port: i64,
}

impl NamedPort {
    fn to_wire(&self) -> v1::NamedPort {
        v1::NamedPort {
            name: self.name.clone(),
            port: self.port,
        }
    }

    fn from_wire(wire: v1::NamedPort) -> Self {
        Self {
            name: wire.name,
            port: wire.port,
        }
    }
}

fn named_ports_to_wire(ports: &[NamedPort]) -> Vec<v1::NamedPort> {
    ports.iter().map(NamedPort::to_wire).collect()
}

fn named_ports_from_wire(ports: Vec<v1::NamedPort>) -> Vec<NamedPort> {
    ports.into_iter().map(NamedPort::from_wire).collect()
}

/// Autohealing policy. Beta only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoHealingPolicy {
    /// Health check URL.
    pub health_check: String,
    /// Seconds to wait before the first health check of a new instance.
    pub initial_delay_sec: i64,
}

impl AutoHealingPolicy {
    fn to_beta(&self) -> beta::InstanceGroupManagerAutoHealingPolicy {
        beta::InstanceGroupManagerAutoHealingPolicy {
            health_check: self.health_check.clone(),
            initial_delay_sec: self.initial_delay_sec,
        }
    }

    fn from_beta(wire: beta::InstanceGroupManagerAutoHealingPolicy) -> Self {
        Self {
            health_check: wire.health_check,
            initial_delay_sec: wire.initial_delay_sec,
        }
    }
}

/// A zonal instance group manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceGroupManager {
    /// Manager name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Zone URL.
    pub zone: String,
    /// Prefix of instance names.
    pub base_instance_name: String,
    /// Instance template URL.
    pub instance_template: String,
    /// Desired number of instances.
    pub target_size: i64,
    /// Target pool URLs.
    pub target_pools: Vec<String>,
    /// Named ports propagated to the instance group.
    pub named_ports: Vec<NamedPort>,
    /// Autohealing policies. Beta only.
    pub auto_healing_policies: Vec<AutoHealingPolicy>,
    /// Optimistic concurrency token.
    pub fingerprint: String,
    /// URL of the managed instance group.
    pub instance_group: String,
    /// Server-assigned URL.
    pub self_link: String,
}

impl InstanceGroupManager {
    /// Projects to the `v1` shape.
    #[must_use]
    pub fn to_production(&self) -> v1::InstanceGroupManager {
        v1::InstanceGroupManager {
            name: self.name.clone(),
            description: self.description.clone(),
            zone: self.zone.clone(),
            base_instance_name: self.base_instance_name.clone(),
            instance_template: self.instance_template.clone(),
            target_size: self.target_size,
            target_pools: self.target_pools.clone(),
            named_ports: named_ports_to_wire(&self.named_ports),
            fingerprint: self.fingerprint.clone(),
            instance_group: self.instance_group.clone(),
            self_link: self.self_link.clone(),
        }
    }

    /// Projects to the `beta` shape.
    #[must_use]
    pub fn to_beta(&self) -> beta::InstanceGroupManager {
        beta::InstanceGroupManager {
            name: self.name.clone(),
            description: self.description.clone(),
            zone: self.zone.clone(),
            base_instance_name: self.base_instance_name.clone(),
            instance_template: self.instance_template.clone(),
            target_size: self.target_size,
            target_pools: self.target_pools.clone(),
            named_ports: named_ports_to_wire(&self.named_ports),
            auto_healing_policies: self
                .auto_healing_policies
                .iter()
                .map(AutoHealingPolicy::to_beta)
                .collect(),
            fingerprint: self.fingerprint.clone(),
            instance_group: self.instance_group.clone(),
            self_link: self.self_link.clone(),
        }
    }

    /// Builds from a `v1` response.
    #[must_use]
    pub fn from_production(wire: v1::InstanceGroupManager) -> Self {
        Self {
            name: wire.name,
            description: wire.description,
            zone: wire.zone,
            base_instance_name: wire.base_instance_name,
            instance_template: wire.instance_template,
            target_size: wire.target_size,
            target_pools: wire.target_pools,
            named_ports: named_ports_from_wire(wire.named_ports),
            auto_healing_policies: Vec::new(),
            fingerprint: wire.fingerprint,
            instance_group: wire.instance_group,
            self_link: wire.self_link,
        }
    }

    /// Builds from a `beta` response.
    #[must_use]
    pub fn from_beta(wire: beta::InstanceGroupManager) -> Self {
        Self {
            name: wire.name,
            description: wire.description,
            zone: wire.zone,
            base_instance_name: wire.base_instance_name,
            instance_template: wire.instance_template,
            target_size: wire.target_size,
            target_pools: wire.target_pools,
            named_ports: named_ports_from_wire(wire.named_ports),
            auto_healing_policies: wire
                .auto_healing_policies
                .into_iter()
                .map(AutoHealingPolicy::from_beta)
                .collect(),
            fingerprint: wire.fingerprint,
            instance_group: wire.instance_group,
            self_link: wire.self_link,
        }
    }
}

/// Replaces the target pools of a manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetTargetPoolsRequest {
    /// Fingerprint from the latest read.
    pub fingerprint: String,
    /// Target pool URLs.
    pub target_pools: Vec<String>,
}

impl SetTargetPoolsRequest {
    /// Projects to the wire shape, identical at both levels.
    #[must_use]
    pub fn to_wire(&self) -> v1::InstanceGroupManagersSetTargetPoolsRequest {
        v1::InstanceGroupManagersSetTargetPoolsRequest {
            fingerprint: self.fingerprint.clone(),
            target_pools: self.target_pools.clone(),
        }
    }
}

/// Points a manager at a new instance template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetInstanceTemplateRequest {
    /// Instance template URL.
    pub instance_template: String,
}

impl SetInstanceTemplateRequest {
    /// Projects to the wire shape, identical at both levels.
    #[must_use]
    pub fn to_wire(&self) -> v1::InstanceGroupManagersSetInstanceTemplateRequest {
        v1::InstanceGroupManagersSetInstanceTemplateRequest {
            instance_template: self.instance_template.clone(),
        }
    }
}

/// Recreates the listed instances.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecreateInstancesRequest {
    /// Instance URLs.
    pub instances: Vec<String>,
}

impl RecreateInstancesRequest {
    /// Projects to the wire shape, identical at both levels.
    #[must_use]
    pub fn to_wire(&self) -> v1::InstanceGroupManagersRecreateInstancesRequest {
        v1::InstanceGroupManagersRecreateInstancesRequest {
            instances: self.instances.clone(),
        }
    }
}

/// Replaces the named ports of an instance group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetNamedPortsRequest {
    /// Instance group fingerprint.
    pub fingerprint: String,
    /// Named ports.
    pub named_ports: Vec<NamedPort>,
}

impl SetNamedPortsRequest {
    /// Projects to the wire shape, identical at both levels.
    #[must_use]
    pub fn to_wire(&self) -> v1::InstanceGroupsSetNamedPortsRequest {
        v1::InstanceGroupsSetNamedPortsRequest {
            fingerprint: self.fingerprint.clone(),
            named_ports: named_ports_to_wire(&self.named_ports),
        }
    }
}

/// Replaces the autohealing policies of a manager. Beta only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetAutoHealingPoliciesRequest {
    /// New policies.
    pub auto_healing_policies: Vec<AutoHealingPolicy>,
}

impl SetAutoHealingPoliciesRequest {
    /// Projects to the `beta` shape.
    #[must_use]
    pub fn to_beta(&self) -> beta::InstanceGroupManagersSetAutoHealingRequest {
        beta::InstanceGroupManagersSetAutoHealingRequest {
            auto_healing_policies: self
                .auto_healing_policies
                .iter()
                .map(AutoHealingPolicy::to_beta)
                .collect(),
        }
    }
}

/// One managed instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedInstance {
    /// Instance URL.
    pub instance: String,
    /// Action in progress, e.g. `NONE` or `RECREATING`.
    pub current_action: String,
}

impl From<v1::ManagedInstance> for ManagedInstance {
    fn from(wire: v1::ManagedInstance) -> Self {
        Self {
            instance: wire.instance,
            current_action: wire.current_action,
        }
    }
}

/// Live view of an instance group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceGroup {
    /// Group name.
    pub name: String,
    /// Current number of instances.
    pub size: i64,
    /// Fingerprint quoted by `setNamedPorts`.
    pub fingerprint: String,
}

impl From<v1::InstanceGroup> for InstanceGroup {
    fn from(wire: v1::InstanceGroup) -> Self {
        Self {
            name: wire.name,
            size: wire.size,
            fingerprint: wire.fingerprint,
        }
    }
}

/// A zone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Zone {
    /// Zone name, e.g. `us-central1-a`.
    pub name: String,
}

impl From<v1::Zone> for Zone {
    fn from(wire: v1::Zone) -> Self {
        Self { name: wire.name }
    }
}

impl From<v1::Operation> for Operation {
    fn from(wire: v1::Operation) -> Self {
        let status = match wire.status.as_str() {
            "DONE" => OperationStatus::Done,
            "RUNNING" => OperationStatus::Running,
            _ => OperationStatus::Pending,
        };
        let errors = wire
            .error
            .map(|e| {
                e.errors
                    .into_iter()
                    .map(|item| OperationFault {
                        code: item.code,
                        message: item.message,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            name: wire.name,
            status,
            errors,
            target_link: wire.target_link,
        }
    }
}
