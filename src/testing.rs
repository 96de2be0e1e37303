//! In-memory fakes of the remote APIs, injected through [`ClientFactory`].

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::api_level::ApiLevel;
use crate::config::ProviderConfig;
use crate::error::{ApiError, LifecycleError, OperationFault, Result, SkyforgeError};
use crate::google::bigtable::{
    ClusterInfo, FamilyInfo, GcPolicy, InstanceAdminApi, InstanceConf, InstanceInfo, TableAdminApi, TableInfo,
};
use crate::google::compute::{
    Address, ComputeApi, InstanceGroup, InstanceGroupManager, ManagedInstance, RecreateInstancesRequest,
    SetAutoHealingPoliciesRequest, SetInstanceTemplateRequest, SetNamedPortsRequest, SetTargetPoolsRequest,
    Zone,
};
use crate::kubernetes::KubernetesApi;
use crate::operation::{Operation, OperationHandle, OperationPoller, OperationStatus, WaitSettings};
use crate::provider::{ClientFactory, ProviderMeta};

/// Provider state over fake clients, with project `p`, region
/// `us-central1` and a deterministic polling schedule.
pub fn test_meta(clients: FakeClients) -> ProviderMeta {
    let mut config = ProviderConfig::default();
    config.google.project = Some("p".to_string());
    config.google.region = Some("us-central1".to_string());
    config.waiter = WaitSettings {
        initial_interval_ms: 500,
        max_interval_ms: 2_000,
        multiplier: 2.0,
        jitter: 0.0,
        timeout_secs: 60,
        max_transient_errors: 3,
    };
    ProviderMeta::new(config, Arc::new(clients))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Client factory handing out preset fakes.
#[derive(Default)]
pub struct FakeClients {
    compute: Option<Arc<FakeCompute>>,
    instance_admin: Option<Arc<FakeInstanceAdmin>>,
    table_admin: Option<Arc<FakeTableAdmin>>,
    kubernetes: Option<Arc<dyn KubernetesApi>>,
}

impl FakeClients {
    pub fn with_compute(mut self, compute: Arc<FakeCompute>) -> Self {
        self.compute = Some(compute);
        self
    }

    pub fn with_bigtable(mut self, instances: Arc<FakeInstanceAdmin>, tables: Arc<FakeTableAdmin>) -> Self {
        self.instance_admin = Some(instances);
        self.table_admin = Some(tables);
        self
    }

    pub fn with_kubernetes(mut self, api: impl KubernetesApi + 'static) -> Self {
        self.kubernetes = Some(Arc::new(api));
        self
    }
}

fn missing(client: &str) -> SkyforgeError {
    SkyforgeError::internal(format!("no fake {client} client configured"))
}

#[async_trait]
impl ClientFactory for FakeClients {
    async fn compute(&self, level: ApiLevel) -> Result<Arc<dyn ComputeApi>> {
        let compute = self.compute.clone().ok_or_else(|| missing("compute"))?;
        assert_eq!(compute.level, level, "handler asked for the wrong API level");
        Ok(compute)
    }

    async fn bigtable_instance_admin(&self, _project: &str) -> Result<Arc<dyn InstanceAdminApi>> {
        let admin = self.instance_admin.clone().ok_or_else(|| missing("instance admin"))?;
        Ok(admin)
    }

    async fn bigtable_admin(&self, _project: &str, instance: &str) -> Result<Arc<dyn TableAdminApi>> {
        let admin = self.table_admin.clone().ok_or_else(|| missing("table admin"))?;
        admin.bound_to(instance);
        Ok(admin)
    }

    async fn kubernetes(&self) -> Result<Arc<dyn KubernetesApi>> {
        self.kubernetes.clone().ok_or_else(|| missing("kubernetes"))
    }
}

#[derive(Default)]
struct ComputeState {
    zones: Vec<String>,
    addresses: BTreeMap<String, Address>,
    managers: BTreeMap<(String, String), InstanceGroupManager>,
    instances: BTreeMap<String, Vec<String>>,
    group_fingerprints: BTreeMap<String, u32>,
    group_sizes: VecDeque<i64>,
    recreated: Vec<String>,
    fingerprints_sent: Vec<(String, String)>,
    operations: BTreeMap<String, String>,
    hanging: BTreeSet<String>,
    fault: Option<OperationFault>,
    delete_failures: Option<(u32, fn() -> SkyforgeError)>,
    calls: Vec<String>,
}

impl ComputeState {
    fn operation(&mut self, call: &str) -> Operation {
        let name = format!("operation-{}", self.operations.len() + 1);
        self.operations.insert(name.clone(), call.to_string());
        Operation {
            name,
            status: OperationStatus::Running,
            ..Operation::default()
        }
    }

    fn record(&mut self, call: &str) {
        self.calls.push(call.to_string());
    }

    fn take_delete_failure(&mut self) -> Option<SkyforgeError> {
        let (remaining, make) = self.delete_failures.as_mut()?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(make())
    }

    fn manager_mut(&mut self, zone: &str, name: &str) -> Result<&mut InstanceGroupManager> {
        self.managers
            .get_mut(&(zone.to_string(), name.to_string()))
            .ok_or_else(|| not_found("instanceGroupManagers", name))
    }
}

fn not_found(collection: &str, name: &str) -> SkyforgeError {
    ApiError::not_found(format!("The resource '{collection}/{name}' was not found")).into()
}

fn stale_fingerprint() -> SkyforgeError {
    ApiError::api_error(412, "Supplied fingerprint does not match current metadata fingerprint").into()
}

fn bump(fingerprint: &str) -> String {
    let n: u32 = fingerprint
        .strip_prefix("fp-")
        .and_then(|n| n.parse().ok())
        .unwrap_or_default();
    format!("fp-{}", n + 1)
}

/// Compute API fake holding addresses and instance group managers.
pub struct FakeCompute {
    level: ApiLevel,
    state: Mutex<ComputeState>,
}

impl FakeCompute {
    pub fn production() -> Self {
        Self::new(ApiLevel::Production)
    }

    pub fn beta() -> Self {
        Self::new(ApiLevel::Beta)
    }

    fn new(level: ApiLevel) -> Self {
        Self {
            level,
            state: Mutex::new(ComputeState::default()),
        }
    }

    fn base(&self, project: &str) -> String {
        format!(
            "https://www.googleapis.com/compute/{}/projects/{project}",
            self.level.compute_version()
        )
    }

    pub fn set_zones(&self, zones: &[&str]) {
        lock(&self.state).zones = zones.iter().map(|z| (*z).to_string()).collect();
    }

    /// Seeds a manager as if created earlier.
    pub fn insert_manager(&self, project: &str, zone: &str, mut manager: InstanceGroupManager) {
        let base = self.base(project);
        manager.zone = format!("{base}/zones/{zone}");
        manager.self_link = format!("{base}/zones/{zone}/instanceGroupManagers/{}", manager.name);
        manager.instance_group = format!("{base}/zones/{zone}/instanceGroups/{}", manager.name);
        if manager.fingerprint.is_empty() {
            manager.fingerprint = "fp-1".to_string();
        }
        let instances = (1..=manager.target_size)
            .map(|i| format!("{base}/zones/{zone}/instances/{}-{i}", manager.base_instance_name))
            .collect();
        let mut state = lock(&self.state);
        state.instances.insert(manager.name.clone(), instances);
        state.group_fingerprints.insert(manager.name.clone(), 1);
        state.managers.insert((zone.to_string(), manager.name.clone()), manager);
    }

    pub fn manager(&self, zone: &str, name: &str) -> Option<InstanceGroupManager> {
        lock(&self.state)
            .managers
            .get(&(zone.to_string(), name.to_string()))
            .cloned()
    }

    pub fn set_managed_instances(&self, manager: &str, instances: &[&str]) {
        lock(&self.state)
            .instances
            .insert(manager.to_string(), instances.iter().map(|i| (*i).to_string()).collect());
    }

    pub fn address(&self, name: &str) -> Option<Address> {
        lock(&self.state).addresses.get(name).cloned()
    }

    /// Operations started by `call` never finish.
    pub fn hang_operations(&self, call: &str) {
        lock(&self.state).hanging.insert(call.to_string());
    }

    /// Every operation finishes with this error.
    pub fn fail_operations(&self, code: &str, message: &str) {
        lock(&self.state).fault = Some(OperationFault {
            code: code.to_string(),
            message: message.to_string(),
        });
    }

    /// The next `count` delete calls fail with `make()`.
    pub fn fail_next_deletes(&self, count: u32, make: fn() -> SkyforgeError) {
        lock(&self.state).delete_failures = Some((count, make));
    }

    /// Sizes reported by the next instance group probes.
    pub fn script_group_sizes(&self, sizes: &[i64]) {
        lock(&self.state).group_sizes = sizes.iter().copied().collect();
    }

    /// Remote calls in order, excluding operation polls.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    pub fn calls_named(&self, call: &str) -> usize {
        lock(&self.state).calls.iter().filter(|c| *c == call).count()
    }

    pub fn recreated(&self) -> Vec<String> {
        lock(&self.state).recreated.clone()
    }

    /// Fingerprint quoted by the last `call`.
    pub fn fingerprint_sent(&self, call: &str) -> Option<String> {
        lock(&self.state)
            .fingerprints_sent
            .iter()
            .rev()
            .find(|(c, _)| c == call)
            .map(|(_, fp)| fp.clone())
    }

    /// What a manager looks like after a trip through this level's wire shape.
    fn over_wire(&self, manager: &InstanceGroupManager) -> InstanceGroupManager {
        match self.level {
            ApiLevel::Production => InstanceGroupManager::from_production(manager.to_production()),
            ApiLevel::Beta => InstanceGroupManager::from_beta(manager.to_beta()),
        }
    }
}

#[async_trait]
impl OperationPoller for FakeCompute {
    async fn poll(&self, handle: &OperationHandle) -> Result<Operation> {
        assert_eq!(handle.api_level, self.level, "operation polled at the wrong API level");
        let state = lock(&self.state);
        let call = state
            .operations
            .get(&handle.name)
            .ok_or_else(|| not_found("operations", &handle.name))?;
        if state.hanging.contains(call) {
            return Ok(Operation {
                name: handle.name.clone(),
                status: OperationStatus::Running,
                ..Operation::default()
            });
        }
        Ok(Operation {
            name: handle.name.clone(),
            status: OperationStatus::Done,
            errors: state.fault.clone().into_iter().collect(),
            target_link: None,
        })
    }
}

#[async_trait]
impl ComputeApi for FakeCompute {
    fn api_level(&self) -> ApiLevel {
        self.level
    }

    async fn list_zones(&self, _project: &str) -> Result<Vec<Zone>> {
        let mut state = lock(&self.state);
        state.record("list_zones");
        Ok(state.zones.iter().map(|name| Zone { name: name.clone() }).collect())
    }

    async fn insert_address(&self, project: &str, region: &str, address: &Address) -> Result<Operation> {
        let base = self.base(project);
        let mut stored = match self.level {
            ApiLevel::Production => Address::from_production(address.to_production()),
            ApiLevel::Beta => Address::from_beta(address.to_beta()),
        };
        stored.region = format!("{base}/regions/{region}");
        stored.self_link = format!("{base}/regions/{region}/addresses/{}", address.name);

        let mut state = lock(&self.state);
        state.record("insert_address");
        state.addresses.insert(address.name.clone(), stored);
        Ok(state.operation("insert_address"))
    }

    async fn get_address(&self, _project: &str, _region: &str, name: &str) -> Result<Address> {
        let mut state = lock(&self.state);
        state.record("get_address");
        state.addresses.get(name).cloned().ok_or_else(|| not_found("addresses", name))
    }

    async fn delete_address(&self, _project: &str, _region: &str, name: &str) -> Result<Operation> {
        let mut state = lock(&self.state);
        state.record("delete_address");
        if let Some(err) = state.take_delete_failure() {
            return Err(err);
        }
        state.addresses.remove(name).ok_or_else(|| not_found("addresses", name))?;
        Ok(state.operation("delete_address"))
    }

    async fn insert_instance_group_manager(
        &self,
        project: &str,
        zone: &str,
        manager: &InstanceGroupManager,
    ) -> Result<Operation> {
        let stored = self.over_wire(manager);
        self.insert_manager(project, zone, stored);
        let mut state = lock(&self.state);
        state.record("insert_instance_group_manager");
        Ok(state.operation("insert_instance_group_manager"))
    }

    async fn get_instance_group_manager(&self, _project: &str, zone: &str, name: &str) -> Result<InstanceGroupManager> {
        let mut state = lock(&self.state);
        state.record("get_instance_group_manager");
        let manager = state.manager_mut(zone, name)?.clone();
        drop(state);
        Ok(self.over_wire(&manager))
    }

    async fn delete_instance_group_manager(&self, _project: &str, zone: &str, name: &str) -> Result<Operation> {
        let mut state = lock(&self.state);
        state.record("delete_instance_group_manager");
        if let Some(err) = state.take_delete_failure() {
            return Err(err);
        }
        state
            .managers
            .remove(&(zone.to_string(), name.to_string()))
            .ok_or_else(|| not_found("instanceGroupManagers", name))?;
        Ok(state.operation("delete_instance_group_manager"))
    }

    async fn set_target_pools(
        &self,
        _project: &str,
        zone: &str,
        name: &str,
        request: &SetTargetPoolsRequest,
    ) -> Result<Operation> {
        let mut state = lock(&self.state);
        state.record("set_target_pools");
        state
            .fingerprints_sent
            .push(("set_target_pools".to_string(), request.fingerprint.clone()));
        let manager = state.manager_mut(zone, name)?;
        if manager.fingerprint != request.fingerprint {
            return Err(stale_fingerprint());
        }
        manager.target_pools.clone_from(&request.target_pools);
        manager.fingerprint = bump(&manager.fingerprint);
        Ok(state.operation("set_target_pools"))
    }

    async fn set_instance_template(
        &self,
        _project: &str,
        zone: &str,
        name: &str,
        request: &SetInstanceTemplateRequest,
    ) -> Result<Operation> {
        let mut state = lock(&self.state);
        state.record("set_instance_template");
        let manager = state.manager_mut(zone, name)?;
        manager.instance_template.clone_from(&request.instance_template);
        manager.fingerprint = bump(&manager.fingerprint);
        Ok(state.operation("set_instance_template"))
    }

    async fn set_auto_healing_policies(
        &self,
        _project: &str,
        zone: &str,
        name: &str,
        request: &SetAutoHealingPoliciesRequest,
    ) -> Result<Operation> {
        if self.level == ApiLevel::Production {
            return Err(LifecycleError::unsupported("instance group manager", "setAutoHealingPolicies").into());
        }
        let mut state = lock(&self.state);
        state.record("set_auto_healing_policies");
        let manager = state.manager_mut(zone, name)?;
        manager
            .auto_healing_policies
            .clone_from(&request.auto_healing_policies);
        manager.fingerprint = bump(&manager.fingerprint);
        Ok(state.operation("set_auto_healing_policies"))
    }

    async fn list_managed_instances(&self, _project: &str, zone: &str, name: &str) -> Result<Vec<ManagedInstance>> {
        let mut state = lock(&self.state);
        state.record("list_managed_instances");
        state.manager_mut(zone, name)?;
        Ok(state
            .instances
            .get(name)
            .map(|instances| {
                instances
                    .iter()
                    .map(|instance| ManagedInstance {
                        instance: instance.clone(),
                        current_action: "NONE".to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn recreate_instances(
        &self,
        _project: &str,
        zone: &str,
        name: &str,
        request: &RecreateInstancesRequest,
    ) -> Result<Operation> {
        let mut state = lock(&self.state);
        state.record("recreate_instances");
        state.manager_mut(zone, name)?;
        state.recreated.extend(request.instances.iter().cloned());
        Ok(state.operation("recreate_instances"))
    }

    async fn resize(&self, _project: &str, zone: &str, name: &str, size: i64) -> Result<Operation> {
        let mut state = lock(&self.state);
        state.record("resize");
        state.manager_mut(zone, name)?.target_size = size;
        Ok(state.operation("resize"))
    }

    async fn get_instance_group(&self, _project: &str, zone: &str, name: &str) -> Result<InstanceGroup> {
        let mut state = lock(&self.state);
        state.record("get_instance_group");
        let fingerprint = format!("fp-{}", state.group_fingerprints.get(name).copied().unwrap_or(1));
        if let Some(size) = state.group_sizes.pop_front() {
            return Ok(InstanceGroup {
                name: name.to_string(),
                size,
                fingerprint,
            });
        }
        let size = state.manager_mut(zone, name)?.target_size;
        Ok(InstanceGroup {
            name: name.to_string(),
            size,
            fingerprint,
        })
    }

    async fn set_named_ports(
        &self,
        _project: &str,
        zone: &str,
        name: &str,
        request: &SetNamedPortsRequest,
    ) -> Result<Operation> {
        let mut state = lock(&self.state);
        state.record("set_named_ports");
        state
            .fingerprints_sent
            .push(("set_named_ports".to_string(), request.fingerprint.clone()));
        let current = state.group_fingerprints.get(name).copied().unwrap_or(1);
        if request.fingerprint != format!("fp-{current}") {
            return Err(stale_fingerprint());
        }
        state.group_fingerprints.insert(name.to_string(), current + 1);
        state.manager_mut(zone, name)?.named_ports.clone_from(&request.named_ports);
        Ok(state.operation("set_named_ports"))
    }
}

#[derive(Default)]
struct InstanceAdminState {
    instances: BTreeMap<String, (InstanceInfo, ClusterInfo)>,
    operations: u32,
    calls: Vec<String>,
}

/// Bigtable instance admin fake.
#[derive(Default)]
pub struct FakeInstanceAdmin {
    state: Mutex<InstanceAdminState>,
}

impl FakeInstanceAdmin {
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    pub fn contains(&self, instance: &str) -> bool {
        lock(&self.state).instances.contains_key(instance)
    }
}

#[async_trait]
impl OperationPoller for FakeInstanceAdmin {
    async fn poll(&self, handle: &OperationHandle) -> Result<Operation> {
        Ok(Operation {
            name: handle.name.clone(),
            status: OperationStatus::Done,
            ..Operation::default()
        })
    }
}

#[async_trait]
impl InstanceAdminApi for FakeInstanceAdmin {
    async fn create_instance(&self, conf: &InstanceConf) -> Result<Operation> {
        let mut state = lock(&self.state);
        state.calls.push("create_instance".to_string());
        state.operations += 1;
        let instance = InstanceInfo {
            name: conf.instance_id.clone(),
            display_name: conf.display_name.clone(),
        };
        let cluster = ClusterInfo {
            name: conf.cluster_id.clone(),
            zone: conf.zone.clone(),
            serve_nodes: conf.num_nodes,
            storage_type: conf.storage_type.as_str().to_string(),
        };
        state.instances.insert(conf.instance_id.clone(), (instance, cluster));
        Ok(Operation {
            name: format!("operations/projects/p/instances/{}/operations/{}", conf.instance_id, state.operations),
            status: OperationStatus::Running,
            ..Operation::default()
        })
    }

    async fn instances(&self) -> Result<Vec<InstanceInfo>> {
        let mut state = lock(&self.state);
        state.calls.push("instances".to_string());
        Ok(state.instances.values().map(|(i, _)| i.clone()).collect())
    }

    async fn clusters(&self, instance: &str) -> Result<Vec<ClusterInfo>> {
        let mut state = lock(&self.state);
        state.calls.push("clusters".to_string());
        state
            .instances
            .get(instance)
            .map(|(_, c)| vec![c.clone()])
            .ok_or_else(|| not_found("instances", instance))
    }

    async fn delete_instance(&self, instance: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push("delete_instance".to_string());
        state
            .instances
            .remove(instance)
            .map(|_| ())
            .ok_or_else(|| not_found("instances", instance))
    }
}

#[derive(Default)]
struct TableAdminState {
    instance: String,
    tables: BTreeMap<(String, String), BTreeMap<String, GcPolicy>>,
    calls: Vec<String>,
}

/// Bigtable table admin fake. Tables are keyed by instance and name.
#[derive(Default)]
pub struct FakeTableAdmin {
    state: Mutex<TableAdminState>,
}

impl FakeTableAdmin {
    pub fn add_table(&self, instance: &str, table: &str) {
        lock(&self.state)
            .tables
            .insert((instance.to_string(), table.to_string()), BTreeMap::new());
    }

    pub fn policy(&self, instance: &str, table: &str, family: &str) -> Option<GcPolicy> {
        lock(&self.state)
            .tables
            .get(&(instance.to_string(), table.to_string()))
            .and_then(|families| families.get(family).cloned())
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    fn bound_to(&self, instance: &str) {
        lock(&self.state).instance = instance.to_string();
    }
}

impl TableAdminState {
    fn families(&mut self, table: &str) -> Result<&mut BTreeMap<String, GcPolicy>> {
        let key = (self.instance.clone(), table.to_string());
        self.tables.get_mut(&key).ok_or_else(|| not_found("tables", table))
    }
}

#[async_trait]
impl TableAdminApi for FakeTableAdmin {
    async fn table_info(&self, table: &str) -> Result<TableInfo> {
        let mut state = lock(&self.state);
        state.calls.push("table_info".to_string());
        let families = state.families(table)?;
        Ok(TableInfo {
            families: families
                .iter()
                .map(|(name, policy)| FamilyInfo {
                    name: name.clone(),
                    gc_policy: policy.to_string(),
                })
                .collect(),
        })
    }

    async fn create_column_family(&self, table: &str, family: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push("create_column_family".to_string());
        let families = state.families(table)?;
        if families.contains_key(family) {
            return Err(ApiError::api_error(409, format!("family {family} already exists")).into());
        }
        families.insert(family.to_string(), GcPolicy::None);
        Ok(())
    }

    async fn set_gc_policy(&self, table: &str, family: &str, policy: &GcPolicy) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push("set_gc_policy".to_string());
        let slot = state
            .families(table)?
            .get_mut(family)
            .ok_or_else(|| not_found("columnFamilies", family))?;
        *slot = policy.clone();
        Ok(())
    }

    async fn delete_column_family(&self, table: &str, family: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push("delete_column_family".to_string());
        state
            .families(table)?
            .remove(family)
            .map(|_| ())
            .ok_or_else(|| not_found("columnFamilies", family))
    }
}
