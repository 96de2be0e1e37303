//! `google_compute_address` and `google_compute_beta_address`.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::api_level::ApiLevel;
use crate::context::Context;
use crate::error::Result;
use crate::google::compute::Address;
use crate::operation::OperationHandle;
use crate::provider::{Lifecycle, ProviderMeta, ResourceDefinition, retry_delete};
use crate::schema::hash::resource_name;
use crate::schema::{AttributeSchema, ResourceData, ResourceSchema};

/// Registry entry for the address at `level`.
#[must_use]
pub fn compute_address_resource(level: ApiLevel) -> ResourceDefinition {
    ResourceDefinition::new(address_schema(level), ComputeAddress::new(level)).with_api_level(level)
}

fn address_schema(level: ApiLevel) -> ResourceSchema {
    let schema = ResourceSchema::new()
        .attribute("name", AttributeSchema::string().required().force_new())
        .attribute("project", AttributeSchema::string().optional_computed().force_new())
        .attribute("region", AttributeSchema::string().optional_computed().force_new())
        .attribute("self_link", AttributeSchema::string().computed());

    match level {
        ApiLevel::Production => schema,
        ApiLevel::Beta => schema.attribute(
            "address",
            AttributeSchema::string()
                .required()
                .force_new()
                .with_description("The static IP address to reserve"),
        ),
    }
}

/// Regional static address.
#[derive(Debug, Clone, Copy)]
pub struct ComputeAddress {
    level: ApiLevel,
}

impl ComputeAddress {
    /// Handler pinned to `level`.
    #[must_use]
    pub const fn new(level: ApiLevel) -> Self {
        Self { level }
    }
}

#[async_trait]
impl Lifecycle for ComputeAddress {
    async fn create(&self, ctx: &Context, data: &mut ResourceData, meta: &ProviderMeta) -> Result<()> {
        let project = meta.project(data)?;
        let region = meta.region(data)?;
        let compute = meta.clients().compute(self.level).await?;

        let address = Address {
            name: data.get_string("name"),
            address: match self.level {
                ApiLevel::Production => None,
                ApiLevel::Beta => Some(data.get_string("address")),
            },
            region: region.clone(),
            self_link: String::new(),
        };

        info!("Creating Address {} in {region}", address.name);
        let op = ctx
            .run("creating address", compute.insert_address(&project, &region, &address))
            .await
            .map_err(|e| e.labeled("Error creating address"))?;

        data.set_id(address.name.as_str());

        let handle = OperationHandle::regional(&project, &region, &op, self.level);
        meta.waiter()
            .wait(ctx, compute.as_ref(), &handle, "Creating Address")
            .await
            .map_err(|e| e.labeled("Error waiting to create Address"))?;

        self.read(ctx, data, meta).await
    }

    async fn read(&self, ctx: &Context, data: &mut ResourceData, meta: &ProviderMeta) -> Result<()> {
        let project = meta.project(data)?;
        let region = meta.region(data)?;
        let compute = meta.clients().compute(self.level).await?;

        let address = match ctx
            .run("reading address", compute.get_address(&project, &region, data.id()))
            .await
        {
            Ok(address) => address,
            Err(e) if e.is_not_found() => {
                info!("Removing Address {:?} because it's gone", data.id());
                data.set_id("");
                return Ok(());
            }
            Err(e) => return Err(e.labeled(format!("Error reading Address {:?}", data.id()))),
        };
        debug!("Read Address {} ({})", address.name, address.self_link);

        data.set("name", address.name.as_str())?;
        data.set("self_link", address.self_link.as_str())?;
        data.set("project", project.as_str())?;
        let observed_region = resource_name(&address.region);
        data.set("region", if observed_region.is_empty() { region.as_str() } else { observed_region })?;
        if self.level.is_beta() {
            data.set("address", address.address.unwrap_or_default())?;
        }
        Ok(())
    }

    async fn delete(&self, ctx: &Context, data: &mut ResourceData, meta: &ProviderMeta) -> Result<()> {
        let project = meta.project(data)?;
        let region = meta.region(data)?;
        let compute = meta.clients().compute(self.level).await?;
        let api = compute.as_ref();
        let name = data.id().to_string();

        info!("Deleting Address {name}");
        let deleted = retry_delete(ctx, meta.delete_retry(), "deleting address", || {
            api.delete_address(&project, &region, &name)
        })
        .await;
        let op = match deleted {
            Ok(op) => op,
            Err(e) if e.is_not_found() => {
                debug!("Address {name} was already gone");
                data.set_id("");
                return Ok(());
            }
            Err(e) => return Err(e.labeled("Error deleting address")),
        };

        let handle = OperationHandle::regional(&project, &region, &op, self.level);
        meta.waiter()
            .wait(ctx, api, &handle, "Deleting Address")
            .await
            .map_err(|e| e.labeled("Error waiting to delete Address"))?;

        data.set_id("");
        Ok(())
    }
}
