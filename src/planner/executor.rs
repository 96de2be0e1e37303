//! Lifecycle executor for a single resource.
//!
//! Drives the handlers registered in a [`ProviderRegistry`]: plans against
//! prior state, applies the plan, refreshes, destroys and imports. Local
//! validation runs before any remote call; remote failures come back in
//! an [`ApplyOutcome`] together with the state that must be persisted.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::context::Context;
use crate::error::{Result, SkyforgeError};
use crate::provider::{ProviderMeta, ProviderRegistry, ResourceDefinition};
use crate::schema::{Attributes, ResourceData};
use crate::state::InstanceState;

use super::diff::{PlanAction, ResourcePlan, plan_resource};

/// Executor for one resource at a time.
#[derive(Debug)]
pub struct LifecycleExecutor<'a> {
    /// Registered resource types.
    registry: &'a ProviderRegistry,
    /// Shared provider handle.
    meta: &'a ProviderMeta,
}

/// Result of applying a plan.
#[derive(Debug)]
pub struct ApplyOutcome {
    /// The plan that was applied.
    pub plan: ResourcePlan,
    /// State to persist; `None` when the resource no longer exists.
    pub state: Option<InstanceState>,
    /// Remote failure, if any. The state is still authoritative.
    pub error: Option<SkyforgeError>,
}

impl ApplyOutcome {
    /// Returns true if the plan was applied without error.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Converts into the persisted state, or the failure.
    ///
    /// # Errors
    ///
    /// Returns the remote failure, if any.
    pub fn into_result(self) -> Result<Option<InstanceState>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.state),
        }
    }
}

impl<'a> LifecycleExecutor<'a> {
    /// Creates a new executor.
    #[must_use]
    pub const fn new(registry: &'a ProviderRegistry, meta: &'a ProviderMeta) -> Self {
        Self { registry, meta }
    }

    fn definition(&self, resource_type: &str) -> Result<&'a ResourceDefinition> {
        self.registry.get(resource_type)
    }

    /// Decodes and validates a manifest for `resource_type`.
    fn desired(definition: &ResourceDefinition, manifest: &serde_json::Value) -> Result<Attributes> {
        let config = definition.schema.decode(manifest)?;
        definition.schema.validate_config(&config)?;
        Ok(config)
    }

    fn prior_data(
        resource_type: &str,
        definition: &ResourceDefinition,
        prior: &InstanceState,
        config: Option<Attributes>,
    ) -> Result<ResourceData> {
        Ok(ResourceData::new(
            resource_type,
            Arc::clone(&definition.schema),
            Some(prior),
            config,
        )?)
    }

    /// Plans the change from `prior` to `manifest`.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown resource types, manifests that fail
    /// validation, or prior state that does not match the schema.
    pub fn plan(
        &self,
        resource_type: &str,
        prior: Option<&InstanceState>,
        manifest: Option<&serde_json::Value>,
    ) -> Result<ResourcePlan> {
        let definition = self.definition(resource_type)?;
        let config = manifest.map(|m| Self::desired(definition, m)).transpose()?;
        let prior_attrs = prior
            .map(|state| {
                crate::state::flatmap::expand(&definition.schema, &state.attributes)
                    .map(|attrs| (state.id.as_str(), attrs))
            })
            .transpose()?;

        let mut plan = plan_resource(
            resource_type,
            &definition.schema,
            prior_attrs.as_ref().map(|(id, attrs)| (*id, attrs)),
            config.as_ref(),
        );
        if plan.action == PlanAction::Update && !definition.supports_update() {
            warn!("{resource_type} cannot update in place, planning a replacement");
            plan.action = PlanAction::Replace;
        }
        Ok(plan)
    }

    /// Applies the plan from `prior` to `manifest`.
    ///
    /// # Errors
    ///
    /// Returns an error only for local failures (unknown type, invalid
    /// manifest). Remote failures are reported in the outcome.
    pub async fn apply(
        &self,
        ctx: &Context,
        resource_type: &str,
        prior: Option<&InstanceState>,
        manifest: Option<&serde_json::Value>,
    ) -> Result<ApplyOutcome> {
        let plan = self.plan(resource_type, prior, manifest)?;
        let definition = self.definition(resource_type)?;
        let config = manifest.map(|m| Self::desired(definition, m)).transpose()?;
        info!("Applying {plan}");

        match (plan.action, prior, config) {
            (PlanAction::NoOp, _, _) => Ok(ApplyOutcome {
                state: prior.cloned(),
                plan,
                error: None,
            }),
            (PlanAction::Create, _, Some(config)) => {
                let (state, error) = self.create(ctx, resource_type, definition, config).await;
                Ok(ApplyOutcome { plan, state, error })
            }
            (PlanAction::Update, Some(prior), Some(config)) => {
                let mut data = Self::prior_data(resource_type, definition, prior, Some(config))?;
                let error = definition
                    .handler
                    .update(ctx, &mut data, self.meta)
                    .await
                    .err();
                Ok(ApplyOutcome {
                    state: data.state(),
                    plan,
                    error,
                })
            }
            (PlanAction::Replace, Some(prior), Some(config)) => {
                let (remaining, error) = self.delete(ctx, resource_type, definition, prior).await?;
                if error.is_some() {
                    error!("Replacement of {resource_type} stopped: delete failed");
                    return Ok(ApplyOutcome {
                        state: remaining,
                        plan,
                        error,
                    });
                }
                let (state, error) = self.create(ctx, resource_type, definition, config).await;
                Ok(ApplyOutcome { plan, state, error })
            }
            (PlanAction::Delete, Some(prior), _) => {
                let (state, error) = self.delete(ctx, resource_type, definition, prior).await?;
                Ok(ApplyOutcome { plan, state, error })
            }
            (action, _, _) => Err(SkyforgeError::internal(format!(
                "inconsistent {action} plan for {resource_type}"
            ))),
        }
    }

    async fn create(
        &self,
        ctx: &Context,
        resource_type: &str,
        definition: &ResourceDefinition,
        config: Attributes,
    ) -> (Option<InstanceState>, Option<SkyforgeError>) {
        let mut data = ResourceData::from_config(resource_type, Arc::clone(&definition.schema), config);
        let error = definition
            .handler
            .create(ctx, &mut data, self.meta)
            .await
            .err();
        if let Some(e) = &error {
            error!("Failed to create {resource_type}: {e}");
        }
        (data.state(), error)
    }

    async fn delete(
        &self,
        ctx: &Context,
        resource_type: &str,
        definition: &ResourceDefinition,
        prior: &InstanceState,
    ) -> Result<(Option<InstanceState>, Option<SkyforgeError>)> {
        let mut data = Self::prior_data(resource_type, definition, prior, None)?;
        match definition.handler.delete(ctx, &mut data, self.meta).await {
            Ok(()) => {
                info!("Deleted {resource_type} {}", prior.id);
                Ok((None, None))
            }
            Err(e) => {
                error!("Failed to delete {resource_type} {}: {e}", prior.id);
                Ok((Some(prior.clone()), Some(e)))
            }
        }
    }

    /// Re-reads the resource. Returns `None` when it is gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub async fn refresh(
        &self,
        ctx: &Context,
        resource_type: &str,
        prior: &InstanceState,
    ) -> Result<Option<InstanceState>> {
        let definition = self.definition(resource_type)?;
        let mut data = Self::prior_data(resource_type, definition, prior, None)?;
        definition.handler.read(ctx, &mut data, self.meta).await?;
        match data.state() {
            Some(state) => {
                debug!("Refreshed {resource_type} {}", state.id);
                Ok(Some(state))
            }
            None => {
                warn!("{resource_type} {} no longer exists", prior.id);
                Ok(None)
            }
        }
    }

    /// Deletes the resource.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown types or unreadable prior state.
    pub async fn destroy(
        &self,
        ctx: &Context,
        resource_type: &str,
        prior: &InstanceState,
    ) -> Result<ApplyOutcome> {
        let plan = self.plan(resource_type, Some(prior), None)?;
        let definition = self.definition(resource_type)?;
        let (state, error) = self.delete(ctx, resource_type, definition, prior).await?;
        Ok(ApplyOutcome { plan, state, error })
    }

    /// Imports an existing resource by ID and reads every instance the
    /// importer returns. Instances that turn out not to exist are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the ID is malformed or a read fails.
    pub async fn import(&self, ctx: &Context, resource_type: &str, id: &str) -> Result<Vec<InstanceState>> {
        let definition = self.definition(resource_type)?;
        let data = ResourceData::for_import(resource_type, Arc::clone(&definition.schema), id);
        let imported = definition.handler.import(ctx, data, self.meta).await?;

        let mut states = Vec::with_capacity(imported.len());
        for mut data in imported {
            definition.handler.read(ctx, &mut data, self.meta).await?;
            match data.state() {
                Some(state) => states.push(state),
                None => warn!("Imported {resource_type} {id} does not exist"),
            }
        }
        info!("Imported {} {resource_type} instance(s) from {id}", states.len());
        Ok(states)
    }

    /// Reports whether the resource still exists remotely.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe fails.
    pub async fn exists(&self, ctx: &Context, resource_type: &str, prior: &InstanceState) -> Result<bool> {
        let definition = self.definition(resource_type)?;
        let data = Self::prior_data(resource_type, definition, prior, None)?;
        definition.handler.exists(ctx, &data, self.meta).await
    }
}
