//! `google_bigtable_instance`: a single-cluster Bigtable instance.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::api_level::ApiLevel;
use crate::context::Context;
use crate::error::Result;
use crate::google::bigtable::{InstanceConf, StorageType};
use crate::operation::OperationHandle;
use crate::provider::{Lifecycle, ProviderMeta, ResourceDefinition};
use crate::schema::{AttributeSchema, ResourceData, ResourceSchema, Value};

/// Registry entry for the Bigtable instance.
#[must_use]
pub fn bigtable_instance_resource() -> ResourceDefinition {
    ResourceDefinition::new(instance_schema(), BigtableInstance)
}

fn validate_storage_type(value: &Value) -> std::result::Result<(), String> {
    value
        .as_str()
        .unwrap_or_default()
        .parse::<StorageType>()
        .map(|_| ())
        .map_err(|e| e.to_string())
}

fn instance_schema() -> ResourceSchema {
    ResourceSchema::new()
        .attribute("name", AttributeSchema::string().required().force_new())
        .attribute("cluster_id", AttributeSchema::string().required().force_new())
        .attribute("zone", AttributeSchema::string().required().force_new())
        .attribute("num_nodes", AttributeSchema::int().required().force_new())
        .attribute(
            "storage_type",
            AttributeSchema::string()
                .required()
                .force_new()
                .with_validation(validate_storage_type),
        )
        .attribute("project", AttributeSchema::string().optional_computed().force_new())
}

/// Bigtable instance handler. Every attribute forces a new instance.
#[derive(Debug, Clone, Copy)]
pub struct BigtableInstance;

#[async_trait]
impl Lifecycle for BigtableInstance {
    async fn create(&self, ctx: &Context, data: &mut ResourceData, meta: &ProviderMeta) -> Result<()> {
        let storage_type: StorageType = data.get_string("storage_type").parse()?;
        let project = meta.project(data)?;
        let name = data.get_string("name");

        let conf = InstanceConf {
            instance_id: name.clone(),
            display_name: name.clone(),
            cluster_id: data.get_string("cluster_id"),
            zone: data.get_string("zone"),
            num_nodes: data.get_int("num_nodes"),
            storage_type,
        };

        let admin = meta.clients().bigtable_instance_admin(&project).await?;
        info!("Creating BigTable instance {name} ({storage_type}, {} nodes)", conf.num_nodes);
        let op = ctx
            .run("creating Bigtable instance", admin.create_instance(&conf))
            .await
            .map_err(|e| e.labeled(format!("Error creating instance. {name}")))?;

        data.set_id(name.as_str());

        let handle = OperationHandle::global(&project, &op, ApiLevel::Production);
        meta.waiter()
            .wait(ctx, admin.as_ref(), &handle, "Creating BigTable instance")
            .await
            .map_err(|e| e.labeled(format!("Error waiting for instance {name}")))?;

        self.read(ctx, data, meta).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData, meta: &ProviderMeta) -> Result<()> {
        let project = meta.project(data)?;
        let admin = meta.clients().bigtable_instance_admin(&project).await?;
        let id = data.id().to_string();

        let instances = ctx
            .run("listing Bigtable instances", admin.instances())
            .await
            .map_err(|e| e.labeled(format!("Error retrieving instance {id}")))?;
        let Some(instance) = instances.into_iter().find(|i| i.name == id) else {
            warn!("Removing BigTable instance {id:?} because it's gone");
            data.set_id("");
            return Ok(());
        };

        let clusters = match ctx.run("listing Bigtable clusters", admin.clusters(&id)).await {
            Ok(clusters) => clusters,
            Err(e) if e.is_not_found() => {
                warn!("Removing BigTable instance {id:?} because its clusters are gone");
                data.set_id("");
                return Ok(());
            }
            Err(e) => return Err(e.labeled(format!("Error retrieving clusters of instance {id}"))),
        };

        data.set("name", instance.name.as_str())?;
        data.set("project", project.as_str())?;
        match clusters.first() {
            Some(cluster) => {
                data.set("cluster_id", cluster.name.as_str())?;
                data.set("zone", cluster.zone.as_str())?;
                data.set("num_nodes", cluster.serve_nodes)?;
                data.set("storage_type", cluster.storage_type.as_str())?;
            }
            None => debug!("BigTable instance {id} has no clusters"),
        }
        Ok(())
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData, meta: &ProviderMeta) -> Result<()> {
        let project = meta.project(data)?;
        let admin = meta.clients().bigtable_instance_admin(&project).await?;
        let id = data.id().to_string();

        match ctx.run("deleting Bigtable instance", admin.delete_instance(&id)).await {
            Ok(()) => info!("Deleted BigTable instance {id}"),
            Err(e) if e.is_not_found() => debug!("BigTable instance {id} was already gone"),
            Err(e) => return Err(e.labeled(format!("Error deleting instance. {id}"))),
        }

        data.set_id("");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeClients, FakeInstanceAdmin, FakeTableAdmin, test_meta};
    use serde_json::json;
    use std::sync::Arc;

    fn setup() -> (Arc<FakeInstanceAdmin>, ProviderMeta) {
        let admin = Arc::new(FakeInstanceAdmin::default());
        let meta = test_meta(
            FakeClients::default().with_bigtable(admin.clone(), Arc::new(FakeTableAdmin::default())),
        );
        (admin, meta)
    }

    fn data(manifest: serde_json::Value) -> ResourceData {
        let schema = Arc::new(instance_schema());
        let config = schema.decode(&manifest).expect("manifest should decode");
        ResourceData::from_config("google_bigtable_instance", schema, config)
    }

    fn manifest(storage_type: &str) -> serde_json::Value {
        json!({
            "name": "events",
            "cluster_id": "events-c1",
            "zone": "us-central1-b",
            "num_nodes": 3,
            "storage_type": storage_type,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_and_read() {
        let (admin, meta) = setup();
        let mut data = data(manifest("SSD"));

        BigtableInstance
            .create(&Context::background(), &mut data, &meta)
            .await
            .expect("create should succeed");

        assert_eq!(data.id(), "events");
        assert_eq!(data.get_string("cluster_id"), "events-c1");
        assert_eq!(data.get_int("num_nodes"), 3);
        assert_eq!(data.get_string("project"), "p");
        assert_eq!(admin.calls(), vec!["create_instance", "instances", "clusters"]);
    }

    #[tokio::test]
    async fn test_invalid_storage_type_fails_before_any_call() {
        let (admin, meta) = setup();
        let mut data = data(manifest("XYZ"));

        let err = BigtableInstance
            .create(&Context::background(), &mut data, &meta)
            .await
            .expect_err("XYZ is not a storage type");

        assert!(err.is_validation());
        assert!(err.to_string().contains("Saw: XYZ"));
        assert!(admin.calls().is_empty());
        assert_eq!(data.id(), "");

        let schema = instance_schema();
        let config = schema.decode(&manifest("XYZ")).expect("decode");
        assert!(schema.validate_config(&config).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_missing_clears_id() {
        let (_admin, meta) = setup();
        let mut data = ResourceData::for_import("google_bigtable_instance", Arc::new(instance_schema()), "gone");

        BigtableInstance
            .read(&Context::background(), &mut data, &meta)
            .await
            .expect("read should succeed");
        assert_eq!(data.id(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_is_idempotent() {
        let (admin, meta) = setup();
        let mut data = data(manifest("HDD"));
        let ctx = Context::background();
        BigtableInstance.create(&ctx, &mut data, &meta).await.expect("create");

        BigtableInstance.delete(&ctx, &mut data, &meta).await.expect("first delete");
        assert!(!admin.contains("events"));

        data.set_id("events");
        BigtableInstance.delete(&ctx, &mut data, &meta).await.expect("second delete");
        assert_eq!(data.id(), "");
    }
}
