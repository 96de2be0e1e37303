//! `google_bigtable_family`: a column family with a version-based GC
//! policy.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::error::{LifecycleError, Result, SchemaError};
use crate::google::bigtable::GcPolicy;
use crate::provider::{Lifecycle, ProviderMeta, ResourceDefinition};
use crate::schema::{AttributeSchema, ResourceData, ResourceSchema, Value};

/// Registry entry for the Bigtable column family.
#[must_use]
pub fn bigtable_family_resource() -> ResourceDefinition {
    ResourceDefinition::new(family_schema(), BigtableFamily)
}

fn validate_version_policy(value: &Value) -> std::result::Result<(), String> {
    match value.as_int() {
        Some(n) if n >= 1 => Ok(()),
        Some(n) => Err(format!("version_policy must be at least 1, got {n}")),
        None => Err("version_policy must be an integer".to_string()),
    }
}

fn family_schema() -> ResourceSchema {
    ResourceSchema::new()
        .attribute("name", AttributeSchema::string().required().force_new())
        .attribute("instance_name", AttributeSchema::string().required().force_new())
        .attribute("table_name", AttributeSchema::string().required().force_new())
        .attribute(
            "version_policy",
            AttributeSchema::int()
                .required()
                .with_validation(validate_version_policy),
        )
        .attribute("gc_policy", AttributeSchema::string().computed())
        .attribute("project", AttributeSchema::string().optional_computed().force_new())
}

fn family_id(instance: &str, table: &str, family: &str) -> String {
    format!("{instance}/{table}/{family}")
}

/// Splits an `instance/table/family` ID.
fn id_parts(id: &str) -> Result<(&str, &str, &str)> {
    let mut parts = id.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(instance), Some(table), Some(family), None)
            if !instance.is_empty() && !table.is_empty() && !family.is_empty() =>
        {
            Ok((instance, table, family))
        }
        _ => Err(LifecycleError::InvalidImportId {
            id: id.to_string(),
            expected: "instance/table/family".to_string(),
        }
        .into()),
    }
}

fn version_policy(data: &ResourceData) -> Result<GcPolicy> {
    let versions = data.get_int("version_policy");
    if versions < 1 {
        return Err(SchemaError::invalid(
            "version_policy",
            format!("version_policy must be at least 1, got {versions}"),
        )
        .into());
    }
    Ok(GcPolicy::MaxVersions(versions))
}

/// Column family handler. Only the version policy updates in place.
#[derive(Debug, Clone, Copy)]
pub struct BigtableFamily;

#[async_trait]
impl Lifecycle for BigtableFamily {
    async fn create(&self, ctx: &Context, data: &mut ResourceData, meta: &ProviderMeta) -> Result<()> {
        let policy = version_policy(data)?;
        let project = meta.project(data)?;
        let instance = data.get_string("instance_name");
        let table = data.get_string("table_name");
        let name = data.get_string("name");
        let admin = meta.clients().bigtable_admin(&project, &instance).await?;

        ctx.run("reading Bigtable table", admin.table_info(&table))
            .await
            .map_err(|e| e.labeled(format!("Error retrieving table. Could not find {table} in {instance}")))?;

        info!("Creating column family {name} on {instance}/{table}");
        ctx.run("creating column family", admin.create_column_family(&table, &name))
            .await
            .map_err(|e| e.labeled(format!("Error creating column family {name}")))?;

        data.set_id(family_id(&instance, &table, &name));

        ctx.run("setting GC policy", admin.set_gc_policy(&table, &name, &policy))
            .await
            .map_err(|e| e.labeled(format!("Error setting GC policy on column family {name}")))?;

        self.read(ctx, data, meta).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData, meta: &ProviderMeta) -> Result<()> {
        let project = meta.project(data)?;
        let id = data.id().to_string();
        let (instance, table, name) = id_parts(&id)?;
        let admin = meta.clients().bigtable_admin(&project, instance).await?;

        let info = match ctx.run("reading Bigtable table", admin.table_info(table)).await {
            Ok(info) => info,
            Err(e) if e.is_not_found() => {
                warn!("Removing column family {id:?} because its table is gone");
                data.set_id("");
                return Ok(());
            }
            Err(e) => return Err(e.labeled(format!("Error retrieving table {table}"))),
        };
        let Some(family) = info.family(name) else {
            warn!("Removing column family {id:?} because it's gone");
            data.set_id("");
            return Ok(());
        };

        data.set("name", name)?;
        data.set("instance_name", instance)?;
        data.set("table_name", table)?;
        data.set("project", project.as_str())?;
        data.set("gc_policy", family.gc_policy.as_str())?;
        match GcPolicy::parse(&family.gc_policy).max_versions() {
            Some(versions) => data.set("version_policy", versions)?,
            None => debug!("Column family {id} has a non-version GC policy {:?}", family.gc_policy),
        }
        Ok(())
    }

    async fn update(&self, ctx: &Context, data: &mut ResourceData, meta: &ProviderMeta) -> Result<()> {
        let policy = version_policy(data)?;
        let project = meta.project(data)?;
        let id = data.id().to_string();
        let (instance, table, name) = id_parts(&id)?;
        let admin = meta.clients().bigtable_admin(&project, instance).await?;

        info!("Updating GC policy of {id} to {policy}");
        ctx.run("updating GC policy", admin.set_gc_policy(table, name, &policy))
            .await
            .map_err(|e| e.labeled(format!("Error updating GC policy on column family {name}")))?;

        self.read(ctx, data, meta).await
    }

    fn supports_update(&self) -> bool {
        true
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData, meta: &ProviderMeta) -> Result<()> {
        let project = meta.project(data)?;
        let id = data.id().to_string();
        let (instance, table, name) = id_parts(&id)?;
        let admin = meta.clients().bigtable_admin(&project, instance).await?;

        match ctx
            .run("deleting column family", admin.delete_column_family(table, name))
            .await
        {
            Ok(()) => info!("Deleted column family {id}"),
            Err(e) if e.is_not_found() => debug!("Column family {id} was already gone"),
            Err(e) => return Err(e.labeled(format!("Error deleting column family {name}"))),
        }

        data.set_id("");
        Ok(())
    }

    async fn import(&self, _ctx: &Context, data: ResourceData, _meta: &ProviderMeta) -> Result<Vec<ResourceData>> {
        id_parts(data.id())?;
        Ok(vec![data])
    }
}
