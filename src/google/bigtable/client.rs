//! Bigtable Admin clients over the `v2` REST surface.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::{GoogleConfig, HttpConfig};
use crate::error::Result;
use crate::http::RestClient;
use crate::operation::{Operation, OperationHandle, OperationPoller};
use crate::schema::hash::resource_name;

use super::types::{
    ClusterInfo, FamilyInfo, GcPolicy, GcRule, InstanceConf, InstanceInfo, LongRunningOperation,
    TableInfo,
};

/// Project-scoped instance administration.
#[async_trait]
pub trait InstanceAdminApi: OperationPoller {
    /// Starts creating an instance with one cluster.
    async fn create_instance(&self, conf: &InstanceConf) -> Result<Operation>;

    /// Lists the project's instances.
    async fn instances(&self) -> Result<Vec<InstanceInfo>>;

    /// Lists the clusters of an instance.
    async fn clusters(&self, instance: &str) -> Result<Vec<ClusterInfo>>;

    /// Deletes an instance.
    async fn delete_instance(&self, instance: &str) -> Result<()>;
}

/// Table administration bound to one instance.
#[async_trait]
pub trait TableAdminApi: Send + Sync {
    /// Fetches a table with its column families.
    async fn table_info(&self, table: &str) -> Result<TableInfo>;

    /// Adds a column family with no GC rule.
    async fn create_column_family(&self, table: &str, family: &str) -> Result<()>;

    /// Replaces the GC rule of a family.
    async fn set_gc_policy(&self, table: &str, family: &str, policy: &GcPolicy) -> Result<()>;

    /// Drops a column family and its data.
    async fn delete_column_family(&self, table: &str, family: &str) -> Result<()>;
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListInstancesResponse {
    instances: Vec<InstanceWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct InstanceWire {
    name: String,
    display_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListClustersResponse {
    clusters: Vec<ClusterWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ClusterWire {
    name: String,
    location: String,
    serve_nodes: i64,
    default_storage_type: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TableWire {
    column_families: BTreeMap<String, ColumnFamilyWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ColumnFamilyWire {
    gc_rule: Option<GcRule>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyColumnFamiliesRequest {
    modifications: Vec<serde_json::Value>,
}

/// HTTP instance admin client for one project.
#[derive(Debug, Clone)]
pub struct InstanceAdminClient {
    rest: RestClient,
    endpoint: String,
    project: String,
}

impl InstanceAdminClient {
    /// Creates a client for `project`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(google: &GoogleConfig, http: &HttpConfig, project: &str) -> Result<Self> {
        Ok(Self {
            rest: RestClient::new(http, google.access_token.clone())?,
            endpoint: google.bigtable_admin_endpoint.trim_end_matches('/').to_string(),
            project: project.to_string(),
        })
    }

    fn project_url(&self) -> String {
        format!("{}/v2/projects/{}", self.endpoint, self.project)
    }
}

#[async_trait]
impl OperationPoller for InstanceAdminClient {
    async fn poll(&self, handle: &OperationHandle) -> Result<Operation> {
        let url = format!("{}/v2/{}", self.endpoint, handle.name);
        let op: LongRunningOperation = self.rest.get(&url).await?;
        Ok(op.into())
    }
}

#[async_trait]
impl InstanceAdminApi for InstanceAdminClient {
    async fn create_instance(&self, conf: &InstanceConf) -> Result<Operation> {
        let url = format!("{}/instances", self.project_url());
        let body = json!({
            "instanceId": conf.instance_id,
            "instance": { "displayName": conf.display_name },
            "clusters": {
                (conf.cluster_id.as_str()): {
                    "location": format!("projects/{}/locations/{}", self.project, conf.zone),
                    "serveNodes": conf.num_nodes,
                    "defaultStorageType": conf.storage_type.as_str(),
                }
            }
        });
        debug!("Bigtable create instance {} in {}", conf.instance_id, self.project);
        let op: LongRunningOperation = self.rest.post(&url, &body, false).await?;
        Ok(op.into())
    }

    async fn instances(&self) -> Result<Vec<InstanceInfo>> {
        let url = format!("{}/instances", self.project_url());
        let response: ListInstancesResponse = self.rest.get(&url).await?;
        Ok(response
            .instances
            .into_iter()
            .map(|i| InstanceInfo {
                name: resource_name(&i.name).to_string(),
                display_name: i.display_name,
            })
            .collect())
    }

    async fn clusters(&self, instance: &str) -> Result<Vec<ClusterInfo>> {
        let url = format!("{}/instances/{instance}/clusters", self.project_url());
        let response: ListClustersResponse = self.rest.get(&url).await?;
        Ok(response
            .clusters
            .into_iter()
            .map(|c| ClusterInfo {
                name: resource_name(&c.name).to_string(),
                zone: resource_name(&c.location).to_string(),
                serve_nodes: c.serve_nodes,
                storage_type: c.default_storage_type,
            })
            .collect())
    }

    async fn delete_instance(&self, instance: &str) -> Result<()> {
        let url = format!("{}/instances/{instance}", self.project_url());
        debug!("Bigtable delete instance {instance} in {}", self.project);
        let _: serde_json::Value = self.rest.delete(&url, true).await?;
        Ok(())
    }
}

/// HTTP table admin client for one instance.
#[derive(Debug, Clone)]
pub struct TableAdminClient {
    rest: RestClient,
    endpoint: String,
    project: String,
    instance: String,
}

impl TableAdminClient {
    /// Creates a client bound to `project`/`instance`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(google: &GoogleConfig, http: &HttpConfig, project: &str, instance: &str) -> Result<Self> {
        Ok(Self {
            rest: RestClient::new(http, google.access_token.clone())?,
            endpoint: google.bigtable_admin_endpoint.trim_end_matches('/').to_string(),
            project: project.to_string(),
            instance: instance.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!(
            "{}/v2/projects/{}/instances/{}/tables/{table}",
            self.endpoint, self.project, self.instance
        )
    }

    async fn modify(&self, table: &str, modification: serde_json::Value) -> Result<()> {
        let url = format!("{}:modifyColumnFamilies", self.table_url(table));
        let body = ModifyColumnFamiliesRequest {
            modifications: vec![modification],
        };
        let _: serde_json::Value = self.rest.post(&url, &body, false).await?;
        Ok(())
    }
}

#[async_trait]
impl TableAdminApi for TableAdminClient {
    async fn table_info(&self, table: &str) -> Result<TableInfo> {
        let url = format!("{}?view=FULL", self.table_url(table));
        let wire: TableWire = self.rest.get(&url).await?;
        Ok(TableInfo {
            families: wire
                .column_families
                .into_iter()
                .map(|(name, family)| FamilyInfo {
                    name,
                    gc_policy: GcPolicy::from_wire(family.gc_rule).to_string(),
                })
                .collect(),
        })
    }

    async fn create_column_family(&self, table: &str, family: &str) -> Result<()> {
        debug!("Bigtable create family {family} on {table}");
        self.modify(table, json!({ "id": family, "create": {} })).await
    }

    async fn set_gc_policy(&self, table: &str, family: &str, policy: &GcPolicy) -> Result<()> {
        debug!("Bigtable set GC policy of {family} on {table} to {policy}");
        self.modify(
            table,
            json!({ "id": family, "update": { "gcRule": policy.to_wire() } }),
        )
        .await
    }

    async fn delete_column_family(&self, table: &str, family: &str) -> Result<()> {
        debug!("Bigtable drop family {family} on {table}");
        self.modify(table, json!({ "id": family, "drop": true })).await
    }
}
