//! `google_compute_instance_group_manager` and its beta variant.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::api_level::ApiLevel;
use crate::context::Context;
use crate::error::{LifecycleError, Result, SchemaError};
use crate::google::compute::{
    AutoHealingPolicy, ComputeApi, InstanceGroupManager, NamedPort, RecreateInstancesRequest,
    SetAutoHealingPoliciesRequest, SetInstanceTemplateRequest, SetNamedPortsRequest, SetTargetPoolsRequest,
};
use crate::google::find_in_region;
use crate::operation::{Operation, OperationHandle};
use crate::provider::{Lifecycle, ProviderMeta, ResourceDefinition, retry_delete};
use crate::schema::hash::{compare_self_link_relative_paths, hash_self_link, resource_name};
use crate::schema::{AttributeSchema, Element, ResourceData, ResourceSchema, Value};

/// Seconds of wait budget granted per recreated instance.
const RECREATE_SECS_PER_INSTANCE: u64 = 4;

/// Registry entry for the instance group manager at `level`.
#[must_use]
pub fn instance_group_manager_resource(level: ApiLevel) -> ResourceDefinition {
    ResourceDefinition::new(manager_schema(level), InstanceGroupManagerResource::new(level)).with_api_level(level)
}

/// How instances pick up a new template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStrategy {
    /// Only new instances use the new template.
    None,
    /// Every instance is recreated from the new template.
    Restart,
}

impl UpdateStrategy {
    /// Configuration name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Restart => "RESTART",
        }
    }
}

impl fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateStrategy {
    type Err = SchemaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(Self::None),
            "RESTART" => Ok(Self::Restart),
            other => Err(SchemaError::invalid(
                "update_strategy",
                format!("Update strategy must be \"NONE\" or \"RESTART\", got {other:?}"),
            )),
        }
    }
}

fn validate_update_strategy(value: &Value) -> std::result::Result<(), String> {
    UpdateStrategy::from_str(value.as_str().unwrap_or_default())
        .map(|_| ())
        .map_err(|e| match e {
            SchemaError::Invalid { message, .. } => message,
            other => other.to_string(),
        })
}

fn manager_schema(level: ApiLevel) -> ResourceSchema {
    let named_port = ResourceSchema::new()
        .attribute("name", AttributeSchema::string().required())
        .attribute("port", AttributeSchema::int().required());

    let schema = ResourceSchema::new()
        .attribute("base_instance_name", AttributeSchema::string().required().force_new())
        .attribute(
            "instance_template",
            AttributeSchema::string()
                .required()
                .with_diff_suppress(compare_self_link_relative_paths),
        )
        .attribute("name", AttributeSchema::string().required().force_new())
        .attribute("zone", AttributeSchema::string().required().force_new())
        .attribute("description", AttributeSchema::string().optional().force_new())
        .attribute("fingerprint", AttributeSchema::string().computed())
        .attribute("instance_group", AttributeSchema::string().computed())
        .attribute("named_port", AttributeSchema::list(Element::block(named_port)))
        .attribute("project", AttributeSchema::string().optional_computed().force_new())
        .attribute("self_link", AttributeSchema::string().computed())
        .attribute(
            "update_strategy",
            AttributeSchema::string()
                .optional()
                .with_default(UpdateStrategy::Restart.as_str())
                .with_validation(validate_update_strategy),
        )
        .attribute(
            "target_pools",
            AttributeSchema::set(Element::string()).with_set_hash(hash_self_link),
        )
        .attribute("target_size", AttributeSchema::int().optional_computed());

    match level {
        ApiLevel::Production => schema,
        ApiLevel::Beta => {
            let policy = ResourceSchema::new()
                .attribute(
                    "health_check",
                    AttributeSchema::string()
                        .required()
                        .with_diff_suppress(compare_self_link_relative_paths),
                )
                .attribute("initial_delay_sec", AttributeSchema::int().required());
            schema.attribute(
                "auto_healing_policies",
                AttributeSchema::list(Element::block(policy)).with_items(0, Some(1)),
            )
        }
    }
}

/// Wait budget for recreating `count` instances.
#[must_use]
pub const fn recreate_budget(count: usize) -> Duration {
    Duration::from_secs(RECREATE_SECS_PER_INSTANCE * count as u64)
}

fn expand_named_ports(value: &Value) -> Vec<NamedPort> {
    value
        .elements()
        .into_iter()
        .map(|port| NamedPort {
            name: port
                .lookup(&["name"])
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            port: port.lookup(&["port"]).and_then(Value::as_int).unwrap_or_default(),
        })
        .collect()
}

fn flatten_named_ports(ports: &[NamedPort]) -> Value {
    ports
        .iter()
        .map(|port| {
            let mut block: BTreeMap<String, Value> = BTreeMap::new();
            block.insert("name".to_string(), port.name.as_str().into());
            block.insert("port".to_string(), port.port.into());
            Value::Map(block)
        })
        .collect::<Vec<_>>()
        .into()
}

fn expand_auto_healing_policies(value: &Value) -> Vec<AutoHealingPolicy> {
    value
        .elements()
        .into_iter()
        .map(|policy| AutoHealingPolicy {
            health_check: policy
                .lookup(&["health_check"])
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            initial_delay_sec: policy
                .lookup(&["initial_delay_sec"])
                .and_then(Value::as_int)
                .unwrap_or_default(),
        })
        .collect()
}

fn flatten_auto_healing_policies(policies: &[AutoHealingPolicy]) -> Value {
    policies
        .iter()
        .map(|policy| {
            let mut block: BTreeMap<String, Value> = BTreeMap::new();
            block.insert("health_check".to_string(), policy.health_check.as_str().into());
            block.insert("initial_delay_sec".to_string(), policy.initial_delay_sec.into());
            Value::Map(block)
        })
        .collect::<Vec<_>>()
        .into()
}

fn string_list(items: &[String]) -> Value {
    items.iter().map(Value::from).collect::<Vec<_>>().into()
}

/// Zonal managed instance group.
#[derive(Debug, Clone, Copy)]
pub struct InstanceGroupManagerResource {
    level: ApiLevel,
}

impl InstanceGroupManagerResource {
    /// Handler pinned to `level`.
    #[must_use]
    pub const fn new(level: ApiLevel) -> Self {
        Self { level }
    }

    async fn wait(
        &self,
        ctx: &Context,
        meta: &ProviderMeta,
        compute: &dyn ComputeApi,
        (project, zone): (&str, &str),
        op: &Operation,
        activity: &str,
    ) -> Result<()> {
        let handle = OperationHandle::zonal(project, zone, op, self.level);
        meta.waiter().wait(ctx, compute, &handle, activity).await
    }

    /// Swaps the template and, under `RESTART`, recreates every managed
    /// instance from it.
    async fn update_template(
        &self,
        ctx: &Context,
        data: &ResourceData,
        meta: &ProviderMeta,
        compute: &dyn ComputeApi,
        location: (&str, &str),
        strategy: UpdateStrategy,
    ) -> Result<()> {
        let (project, zone) = location;
        let name = data.id();
        let request = SetInstanceTemplateRequest {
            instance_template: data.get_string("instance_template"),
        };
        let op = ctx
            .run(
                "updating instance template",
                compute.set_instance_template(project, zone, name, &request),
            )
            .await
            .map_err(|e| e.labeled("Error updating InstanceGroupManager"))?;
        self.wait(ctx, meta, compute, location, &op, "Updating InstanceGroupManager")
            .await
            .map_err(|e| e.labeled("Error updating InstanceGroupManager"))?;

        if strategy != UpdateStrategy::Restart {
            return Ok(());
        }

        let managed = ctx
            .run(
                "listing managed instances",
                compute.list_managed_instances(project, zone, name),
            )
            .await
            .map_err(|e| e.labeled("Error getting instance group managers instances"))?;
        if managed.is_empty() {
            debug!("InstanceGroupManager {name} has no instances to recreate");
            return Ok(());
        }

        let request = RecreateInstancesRequest {
            instances: managed.into_iter().map(|m| m.instance).collect(),
        };
        info!("Recreating {} instances of {name}", request.instances.len());
        let op = ctx
            .run(
                "recreating instances",
                compute.recreate_instances(project, zone, name, &request),
            )
            .await
            .map_err(|e| e.labeled("Error restarting instance group managers instances"))?;

        let handle = OperationHandle::zonal(project, zone, &op, self.level);
        meta.waiter()
            .wait_with_timeout(
                ctx,
                compute,
                &handle,
                "Restarting InstanceGroupManagers instances",
                recreate_budget(request.instances.len()),
            )
            .await
            .map_err(|e| e.labeled("Error restarting instance group managers instances"))
    }

    async fn locate(
        &self,
        ctx: &Context,
        data: &ResourceData,
        meta: &ProviderMeta,
        compute: &dyn ComputeApi,
        project: &str,
    ) -> Result<Option<(String, InstanceGroupManager)>> {
        let name = data.id();
        let zone = data.get_string("zone");
        if !zone.is_empty() {
            return match ctx
                .run(
                    "reading instance group manager",
                    compute.get_instance_group_manager(project, &zone, name),
                )
                .await
            {
                Ok(manager) => Ok(Some((zone, manager))),
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(e.labeled(format!("Error reading instance group manager {name:?}"))),
            };
        }

        let region = meta.region(data)?;
        debug!("Zone of {name} unknown, searching region {region}");
        find_in_region(ctx, compute, project, &region, |zone| async move {
            compute.get_instance_group_manager(project, &zone, name).await
        })
        .await
    }
}

#[async_trait]
impl Lifecycle for InstanceGroupManagerResource {
    async fn create(&self, ctx: &Context, data: &mut ResourceData, meta: &ProviderMeta) -> Result<()> {
        let project = meta.project(data)?;
        let zone = data.get_string("zone");
        data.get_string("update_strategy").parse::<UpdateStrategy>()?;
        let compute = meta.clients().compute(self.level).await?;

        let manager = InstanceGroupManager {
            name: data.get_string("name"),
            description: data.get_string("description"),
            base_instance_name: data.get_string("base_instance_name"),
            instance_template: data.get_string("instance_template"),
            target_size: data.get_int("target_size"),
            target_pools: data.get("target_pools").string_elements(),
            named_ports: expand_named_ports(&data.get("named_port")),
            auto_healing_policies: match self.level {
                ApiLevel::Production => Vec::new(),
                ApiLevel::Beta => expand_auto_healing_policies(&data.get("auto_healing_policies")),
            },
            ..InstanceGroupManager::default()
        };

        info!("InstanceGroupManager insert request: {} in {zone}", manager.name);
        let op = ctx
            .run(
                "creating instance group manager",
                compute.insert_instance_group_manager(&project, &zone, &manager),
            )
            .await
            .map_err(|e| e.labeled("Error creating InstanceGroupManager"))?;

        data.set_id(manager.name.as_str());

        self.wait(ctx, meta, compute.as_ref(), (&project, &zone), &op, "Creating InstanceGroupManager")
            .await
            .map_err(|e| e.labeled("Error waiting for InstanceGroupManager creation"))?;

        self.read(ctx, data, meta).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData, meta: &ProviderMeta) -> Result<()> {
        let project = meta.project(data)?;
        let compute = meta.clients().compute(self.level).await?;

        let Some((zone, manager)) = self.locate(ctx, data, meta, compute.as_ref(), &project).await? else {
            warn!("Removing Instance Group Manager {:?} because it's gone", data.id());
            data.set_id("");
            return Ok(());
        };

        data.set("base_instance_name", manager.base_instance_name.as_str())?;
        data.set("instance_template", manager.instance_template.as_str())?;
        data.set("name", manager.name.as_str())?;
        let observed_zone = resource_name(&manager.zone);
        data.set("zone", if observed_zone.is_empty() { zone.as_str() } else { observed_zone })?;
        data.set("description", manager.description.as_str())?;
        data.set("project", project.as_str())?;
        data.set("target_size", manager.target_size)?;
        data.set("target_pools", string_list(&manager.target_pools))?;
        data.set("named_port", flatten_named_ports(&manager.named_ports))?;
        data.set("fingerprint", manager.fingerprint.as_str())?;
        data.set("instance_group", manager.instance_group.as_str())?;
        data.set("self_link", manager.self_link.as_str())?;
        let strategy = data.get_ok("update_strategy").map_or_else(
            || UpdateStrategy::Restart.as_str().to_string(),
            |v| v.as_str().unwrap_or_default().to_string(),
        );
        data.set("update_strategy", strategy)?;
        if self.level.is_beta() {
            data.set(
                "auto_healing_policies",
                flatten_auto_healing_policies(&manager.auto_healing_policies),
            )?;
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, data: &mut ResourceData, meta: &ProviderMeta) -> Result<()> {
        let project = meta.project(data)?;
        let zone = data.get_string("zone");
        let strategy = data.get_string("update_strategy").parse::<UpdateStrategy>()?;
        let compute = meta.clients().compute(self.level).await?;
        let api = compute.as_ref();
        let location = (project.as_str(), zone.as_str());
        let name = data.id().to_string();

        data.partial(true);

        if data.has_change("target_pools") {
            let request = SetTargetPoolsRequest {
                fingerprint: data.get_string("fingerprint"),
                target_pools: data.get("target_pools").string_elements(),
            };
            let op = ctx
                .run(
                    "updating target pools",
                    api.set_target_pools(&project, &zone, &name, &request),
                )
                .await
                .map_err(|e| e.labeled("Error updating InstanceGroupManager"))?;
            self.wait(ctx, meta, api, location, &op, "Updating InstanceGroupManager")
                .await
                .map_err(|e| e.labeled("Error updating InstanceGroupManager"))?;
            data.set_partial("target_pools");
        }

        if data.has_change("instance_template") {
            self.update_template(ctx, data, meta, api, location, strategy).await?;
            data.set_partial("instance_template");
        }

        if data.has_change("named_port") {
            let group = ctx
                .run("reading instance group", api.get_instance_group(&project, &zone, &name))
                .await
                .map_err(|e| e.labeled("Error getting instance group"))?;
            let request = SetNamedPortsRequest {
                fingerprint: group.fingerprint,
                named_ports: expand_named_ports(&data.get("named_port")),
            };
            let op = ctx
                .run("updating named ports", api.set_named_ports(&project, &zone, &name, &request))
                .await
                .map_err(|e| e.labeled("Error updating InstanceGroupManager"))?;
            self.wait(ctx, meta, api, location, &op, "Updating InstanceGroupManager")
                .await
                .map_err(|e| e.labeled("Error updating InstanceGroupManager"))?;
            data.set_partial("named_port");
        }

        if data.has_change("target_size") {
            if let Some(size) = data.get_ok("target_size").and_then(|v| v.as_int()) {
                let op = ctx
                    .run("resizing instance group", api.resize(&project, &zone, &name, size))
                    .await
                    .map_err(|e| e.labeled("Error updating InstanceGroupManager"))?;
                self.wait(ctx, meta, api, location, &op, "Updating InstanceGroupManager")
                    .await
                    .map_err(|e| e.labeled("Error updating InstanceGroupManager"))?;
            }
            data.set_partial("target_size");
        }

        if self.level.is_beta() && data.has_change("auto_healing_policies") {
            let request = SetAutoHealingPoliciesRequest {
                auto_healing_policies: expand_auto_healing_policies(&data.get("auto_healing_policies")),
            };
            let op = ctx
                .run(
                    "updating autohealing policies",
                    api.set_auto_healing_policies(&project, &zone, &name, &request),
                )
                .await
                .map_err(|e| e.labeled("Error updating AutoHealingPolicies"))?;
            self.wait(ctx, meta, api, location, &op, "Updating AutoHealingPolicies")
                .await
                .map_err(|e| e.labeled("Error updating AutoHealingPolicies"))?;
            data.set_partial("auto_healing_policies");
        }

        if data.has_change("update_strategy") {
            data.get_string("update_strategy").parse::<UpdateStrategy>()?;
            data.set_partial("update_strategy");
        }

        data.partial(false);

        self.read(ctx, data, meta).await
    }

    fn supports_update(&self) -> bool {
        true
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData, meta: &ProviderMeta) -> Result<()> {
        let project = meta.project(data)?;
        let zone = data.get_string("zone");
        let compute = meta.clients().compute(self.level).await?;
        let api = compute.as_ref();
        let name = data.id().to_string();

        info!("Deleting InstanceGroupManager {name}");
        let deleted = retry_delete(ctx, meta.delete_retry(), "deleting instance group manager", || {
            api.delete_instance_group_manager(&project, &zone, &name)
        })
        .await;
        let op = match deleted {
            Ok(op) => op,
            Err(e) if e.is_not_found() => {
                debug!("InstanceGroupManager {name} was already gone");
                data.set_id("");
                return Ok(());
            }
            Err(e) => return Err(e.labeled("Error deleting instance group manager")),
        };

        let mut current = data.get_int("target_size");
        loop {
            match self
                .wait(ctx, meta, api, (&project, &zone), &op, "Deleting InstanceGroupManager")
                .await
            {
                Ok(()) => break,
                Err(e) if e.is_timeout() && current == 0 => {
                    debug!("Delete of empty InstanceGroupManager {name} timed out, treating as done");
                    break;
                }
                Err(e) if e.is_timeout() => {
                    let group = match ctx
                        .run("reading instance group size", api.get_instance_group(&project, &zone, &name))
                        .await
                    {
                        Ok(group) => group,
                        Err(probe) if probe.is_not_found() => break,
                        Err(probe) => return Err(probe.labeled("Error getting instance group size")),
                    };
                    if group.size == 0 {
                        break;
                    }
                    if group.size >= current {
                        return Err(LifecycleError::NotShrinking {
                            name,
                            size: group.size,
                        }
                        .into());
                    }
                    info!(
                        "InstanceGroupManager {name} still deleting, {} of {current} instances left",
                        group.size
                    );
                    current = group.size;
                }
                Err(e) => return Err(e.labeled("Error deleting InstanceGroupManager")),
            }
        }

        data.set_id("");
        Ok(())
    }
}
