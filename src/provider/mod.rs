//! Lifecycle handler contract and provider registry.
//!
//! A resource type is data: a schema plus a [`Lifecycle`] handler,
//! registered by name in a [`ProviderRegistry`]. Handlers receive a
//! [`ResourceData`] accessor, a cancellation [`Context`] and the shared
//! [`ProviderMeta`].

mod factory;
mod meta;
mod registry;
mod retry;

use std::sync::Arc;

use async_trait::async_trait;

use crate::api_level::ApiLevel;
use crate::context::Context;
use crate::error::{LifecycleError, Result};
use crate::schema::{ResourceData, ResourceSchema};

pub use factory::{ClientCache, ClientFactory, HttpClientFactory};
pub use meta::ProviderMeta;
pub use registry::{
    BIGTABLE_FAMILY, BIGTABLE_INSTANCE, COMPUTE_ADDRESS, COMPUTE_BETA_ADDRESS,
    COMPUTE_BETA_INSTANCE_GROUP_MANAGER, COMPUTE_INSTANCE_GROUP_MANAGER, KUBERNETES_SERVICE,
    ProviderRegistry, ProviderRegistryBuilder,
};
pub use retry::{is_delete_retryable, retry_delete};

/// Operations of one resource type.
///
/// `create`, `read` and `delete` are mandatory. The rest have defaults:
/// update is unsupported, exists reads a copy of the data, and import
/// passes the ID through for `read` to hydrate.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Creates the remote resource. Sets the ID as soon as the remote has
    /// accepted the request, then hydrates through `read`.
    async fn create(&self, ctx: &Context, data: &mut ResourceData, meta: &ProviderMeta) -> Result<()>;

    /// Refreshes every attribute from the remote. Clears the ID when the
    /// resource is gone.
    async fn read(&self, ctx: &Context, data: &mut ResourceData, meta: &ProviderMeta) -> Result<()>;

    /// Applies in-place changes.
    async fn update(&self, _ctx: &Context, data: &mut ResourceData, _meta: &ProviderMeta) -> Result<()> {
        Err(LifecycleError::unsupported(data.resource_type(), "update").into())
    }

    /// Deletes the remote resource. A resource already gone is a success.
    async fn delete(&self, ctx: &Context, data: &mut ResourceData, meta: &ProviderMeta) -> Result<()>;

    /// Returns true when the handler implements `update`.
    fn supports_update(&self) -> bool {
        false
    }

    /// Reports whether the remote resource still exists.
    async fn exists(&self, ctx: &Context, data: &ResourceData, meta: &ProviderMeta) -> Result<bool> {
        let mut probe = data.clone();
        self.read(ctx, &mut probe, meta).await?;
        Ok(!probe.id().is_empty())
    }

    /// Expands an imported ID into the instances to read.
    async fn import(&self, _ctx: &Context, data: ResourceData, _meta: &ProviderMeta) -> Result<Vec<ResourceData>> {
        Ok(vec![data])
    }
}

/// A registered resource type.
#[derive(Clone)]
pub struct ResourceDefinition {
    /// Attribute schema.
    pub schema: Arc<ResourceSchema>,
    /// Lifecycle operations.
    pub handler: Arc<dyn Lifecycle>,
    /// API level the handler is pinned to, when it talks to a versioned API.
    pub api_level: Option<ApiLevel>,
}

impl std::fmt::Debug for ResourceDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceDefinition")
            .field("schema", &self.schema)
            .field("api_level", &self.api_level)
            .field("supports_update", &self.handler.supports_update())
            .finish_non_exhaustive()
    }
}

impl ResourceDefinition {
    /// Creates a definition.
    #[must_use]
    pub fn new(schema: ResourceSchema, handler: impl Lifecycle + 'static) -> Self {
        Self {
            schema: Arc::new(schema),
            handler: Arc::new(handler),
            api_level: None,
        }
    }

    /// Records the API level the handler speaks.
    #[must_use]
    pub const fn with_api_level(mut self, level: ApiLevel) -> Self {
        self.api_level = Some(level);
        self
    }

    /// Returns true when the handler implements `update`.
    #[must_use]
    pub fn supports_update(&self) -> bool {
        self.handler.supports_update()
    }
}
