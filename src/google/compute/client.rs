//! Compute Engine client.
//!
//! [`ComputeApi`] speaks the level-independent vocabulary from
//! [`super::shared`]. [`ComputeClient`] is pinned to one API level and
//! picks the `v1` or `beta` path and wire shape on every call.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api_level::ApiLevel;
use crate::config::{GoogleConfig, HttpConfig};
use crate::error::{LifecycleError, Result};
use crate::http::RestClient;
use crate::operation::{Operation, OperationHandle, OperationPoller, OperationScope};

use super::shared::{
    Address, InstanceGroup, InstanceGroupManager, ManagedInstance, RecreateInstancesRequest,
    SetAutoHealingPoliciesRequest, SetInstanceTemplateRequest, SetNamedPortsRequest,
    SetTargetPoolsRequest, Zone,
};
use super::{beta, v1};

/// Compute Engine operations used by the resource handlers.
///
/// Every mutating call returns the operation to wait on.
#[async_trait]
pub trait ComputeApi: OperationPoller {
    /// The level this client speaks.
    fn api_level(&self) -> ApiLevel;

    /// Lists every zone of the project.
    async fn list_zones(&self, project: &str) -> Result<Vec<Zone>>;

    /// Reserves an address.
    async fn insert_address(&self, project: &str, region: &str, address: &Address) -> Result<Operation>;

    /// Fetches an address.
    async fn get_address(&self, project: &str, region: &str, name: &str) -> Result<Address>;

    /// Releases an address.
    async fn delete_address(&self, project: &str, region: &str, name: &str) -> Result<Operation>;

    /// Creates an instance group manager.
    async fn insert_instance_group_manager(
        &self,
        project: &str,
        zone: &str,
        manager: &InstanceGroupManager,
    ) -> Result<Operation>;

    /// Fetches an instance group manager.
    async fn get_instance_group_manager(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<InstanceGroupManager>;

    /// Deletes an instance group manager and its instances.
    async fn delete_instance_group_manager(&self, project: &str, zone: &str, name: &str) -> Result<Operation>;

    /// Replaces the target pools.
    async fn set_target_pools(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        request: &SetTargetPoolsRequest,
    ) -> Result<Operation>;

    /// Points the manager at a new template.
    async fn set_instance_template(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        request: &SetInstanceTemplateRequest,
    ) -> Result<Operation>;

    /// Replaces the autohealing policies. Beta only.
    async fn set_auto_healing_policies(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        request: &SetAutoHealingPoliciesRequest,
    ) -> Result<Operation>;

    /// Lists the instances owned by the manager.
    async fn list_managed_instances(&self, project: &str, zone: &str, name: &str) -> Result<Vec<ManagedInstance>>;

    /// Recreates the listed instances.
    async fn recreate_instances(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        request: &RecreateInstancesRequest,
    ) -> Result<Operation>;

    /// Changes the target size.
    async fn resize(&self, project: &str, zone: &str, name: &str, size: i64) -> Result<Operation>;

    /// Fetches the instance group backing a manager.
    async fn get_instance_group(&self, project: &str, zone: &str, name: &str) -> Result<InstanceGroup>;

    /// Replaces the named ports of an instance group.
    async fn set_named_ports(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        request: &SetNamedPortsRequest,
    ) -> Result<Operation>;
}

/// HTTP Compute client pinned to one API level.
#[derive(Debug, Clone)]
pub struct ComputeClient {
    rest: RestClient,
    endpoint: String,
    level: ApiLevel,
}

impl ComputeClient {
    /// Creates a client for `level`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(google: &GoogleConfig, http: &HttpConfig, level: ApiLevel) -> Result<Self> {
        Ok(Self {
            rest: RestClient::new(http, google.access_token.clone())?,
            endpoint: google.compute_endpoint.trim_end_matches('/').to_string(),
            level,
        })
    }

    fn project_url(&self, level: ApiLevel, project: &str) -> String {
        format!(
            "{}/compute/{}/projects/{project}",
            self.endpoint,
            level.compute_version()
        )
    }

    fn zonal_url(&self, project: &str, zone: &str, path: &str) -> String {
        format!("{}/zones/{zone}/{path}", self.project_url(self.level, project))
    }

    fn regional_url(&self, project: &str, region: &str, path: &str) -> String {
        format!("{}/regions/{region}/{path}", self.project_url(self.level, project))
    }

    /// POSTs a mutation tagged with a fresh request ID so retries are safe.
    async fn mutate<B: Serialize + Sync + ?Sized>(&self, url: &str, body: &B) -> Result<Operation> {
        let url = with_request_id(url);
        debug!("Compute {} POST {url}", self.level);
        let op: v1::Operation = self.rest.post(&url, body, true).await?;
        Ok(op.into())
    }

    async fn remove(&self, url: &str) -> Result<Operation> {
        let url = with_request_id(url);
        debug!("Compute {} DELETE {url}", self.level);
        let op: v1::Operation = self.rest.delete(&url, true).await?;
        Ok(op.into())
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("Compute {} GET {url}", self.level);
        self.rest.get(url).await
    }
}

fn with_request_id(url: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}requestId={}", uuid::Uuid::new_v4())
}

#[async_trait]
impl OperationPoller for ComputeClient {
    async fn poll(&self, handle: &OperationHandle) -> Result<Operation> {
        let base = self.project_url(handle.api_level, &handle.project);
        let url = match &handle.scope {
            OperationScope::Zonal(zone) => format!("{base}/zones/{zone}/operations/{}", handle.name),
            OperationScope::Regional(region) => {
                format!("{base}/regions/{region}/operations/{}", handle.name)
            }
            OperationScope::Global => format!("{base}/global/operations/{}", handle.name),
        };
        let op: v1::Operation = self.rest.get(&url).await?;
        Ok(op.into())
    }
}

#[async_trait]
impl ComputeApi for ComputeClient {
    fn api_level(&self) -> ApiLevel {
        self.level
    }

    async fn list_zones(&self, project: &str) -> Result<Vec<Zone>> {
        let base = format!("{}/zones", self.project_url(self.level, project));
        let mut zones = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let url = match &page_token {
                Some(token) => format!("{base}?pageToken={token}"),
                None => base.clone(),
            };
            let page: v1::ZoneList = self.fetch(&url).await?;
            zones.extend(page.items.into_iter().map(Zone::from));
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(zones)
    }

    async fn insert_address(&self, project: &str, region: &str, address: &Address) -> Result<Operation> {
        let url = self.regional_url(project, region, "addresses");
        match self.level {
            ApiLevel::Production => self.mutate(&url, &address.to_production()).await,
            ApiLevel::Beta => self.mutate(&url, &address.to_beta()).await,
        }
    }

    async fn get_address(&self, project: &str, region: &str, name: &str) -> Result<Address> {
        let url = self.regional_url(project, region, &format!("addresses/{name}"));
        match self.level {
            ApiLevel::Production => Ok(Address::from_production(self.fetch::<v1::Address>(&url).await?)),
            ApiLevel::Beta => Ok(Address::from_beta(self.fetch::<beta::Address>(&url).await?)),
        }
    }

    async fn delete_address(&self, project: &str, region: &str, name: &str) -> Result<Operation> {
        self.remove(&self.regional_url(project, region, &format!("addresses/{name}")))
            .await
    }

    async fn insert_instance_group_manager(
        &self,
        project: &str,
        zone: &str,
        manager: &InstanceGroupManager,
    ) -> Result<Operation> {
        let url = self.zonal_url(project, zone, "instanceGroupManagers");
        match self.level {
            ApiLevel::Production => self.mutate(&url, &manager.to_production()).await,
            ApiLevel::Beta => self.mutate(&url, &manager.to_beta()).await,
        }
    }

    async fn get_instance_group_manager(
        &self,
        project: &str,
        zone: &str,
        name: &str,
    ) -> Result<InstanceGroupManager> {
        let url = self.zonal_url(project, zone, &format!("instanceGroupManagers/{name}"));
        match self.level {
            ApiLevel::Production => Ok(InstanceGroupManager::from_production(
                self.fetch::<v1::InstanceGroupManager>(&url).await?,
            )),
            ApiLevel::Beta => Ok(InstanceGroupManager::from_beta(
                self.fetch::<beta::InstanceGroupManager>(&url).await?,
            )),
        }
    }

    async fn delete_instance_group_manager(&self, project: &str, zone: &str, name: &str) -> Result<Operation> {
        self.remove(&self.zonal_url(project, zone, &format!("instanceGroupManagers/{name}")))
            .await
    }

    async fn set_target_pools(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        request: &SetTargetPoolsRequest,
    ) -> Result<Operation> {
        let url = self.zonal_url(
            project,
            zone,
            &format!("instanceGroupManagers/{name}/setTargetPools"),
        );
        self.mutate(&url, &request.to_wire()).await
    }

    async fn set_instance_template(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        request: &SetInstanceTemplateRequest,
    ) -> Result<Operation> {
        let url = self.zonal_url(
            project,
            zone,
            &format!("instanceGroupManagers/{name}/setInstanceTemplate"),
        );
        self.mutate(&url, &request.to_wire()).await
    }

    async fn set_auto_healing_policies(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        request: &SetAutoHealingPoliciesRequest,
    ) -> Result<Operation> {
        if !self.level.is_beta() {
            return Err(LifecycleError::unsupported("compute v1", "setAutoHealingPolicies").into());
        }
        let url = self.zonal_url(
            project,
            zone,
            &format!("instanceGroupManagers/{name}/setAutoHealingPolicies"),
        );
        self.mutate(&url, &request.to_beta()).await
    }

    async fn list_managed_instances(&self, project: &str, zone: &str, name: &str) -> Result<Vec<ManagedInstance>> {
        let url = self.zonal_url(
            project,
            zone,
            &format!("instanceGroupManagers/{name}/listManagedInstances"),
        );
        let response: v1::InstanceGroupManagersListManagedInstancesResponse =
            self.rest.post(&url, &serde_json::json!({}), true).await?;
        Ok(response
            .managed_instances
            .into_iter()
            .map(ManagedInstance::from)
            .collect())
    }

    async fn recreate_instances(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        request: &RecreateInstancesRequest,
    ) -> Result<Operation> {
        let url = self.zonal_url(
            project,
            zone,
            &format!("instanceGroupManagers/{name}/recreateInstances"),
        );
        self.mutate(&url, &request.to_wire()).await
    }

    async fn resize(&self, project: &str, zone: &str, name: &str, size: i64) -> Result<Operation> {
        let url = self.zonal_url(
            project,
            zone,
            &format!("instanceGroupManagers/{name}/resize?size={size}"),
        );
        self.mutate(&url, &serde_json::json!({})).await
    }

    async fn get_instance_group(&self, project: &str, zone: &str, name: &str) -> Result<InstanceGroup> {
        let url = self.zonal_url(project, zone, &format!("instanceGroups/{name}"));
        Ok(self.fetch::<v1::InstanceGroup>(&url).await?.into())
    }

    async fn set_named_ports(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        request: &SetNamedPortsRequest,
    ) -> Result<Operation> {
        let url = self.zonal_url(project, zone, &format!("instanceGroups/{name}/setNamedPorts"));
        self.mutate(&url, &request.to_wire()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(level: ApiLevel) -> ComputeClient {
        let google = GoogleConfig {
            compute_endpoint: "https://compute.example.test/".to_string(),
            ..GoogleConfig::default()
        };
        ComputeClient::new(&google, &HttpConfig::default(), level).expect("client")
    }

    #[test]
    fn test_urls_follow_api_level() {
        assert_eq!(
            client(ApiLevel::Production).zonal_url("p", "us-central1-a", "instanceGroupManagers"),
            "https://compute.example.test/compute/v1/projects/p/zones/us-central1-a/instanceGroupManagers"
        );
        assert_eq!(
            client(ApiLevel::Beta).regional_url("p", "us-central1", "addresses/a"),
            "https://compute.example.test/compute/beta/projects/p/regions/us-central1/addresses/a"
        );
    }

    #[test]
    fn test_request_id_appended() {
        let url = with_request_id("https://x/resize?size=3");
        assert!(url.starts_with("https://x/resize?size=3&requestId="));
        let url = with_request_id("https://x/addresses");
        assert!(url.starts_with("https://x/addresses?requestId="));
    }
}
