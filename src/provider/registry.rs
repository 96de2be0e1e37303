//! Name to resource definition lookup.

use std::collections::BTreeMap;

use tracing::debug;

use crate::api_level::ApiLevel;
use crate::error::{LifecycleError, Result};
use crate::google::resources::{
    bigtable_family_resource, bigtable_instance_resource, compute_address_resource,
    instance_group_manager_resource,
};
use crate::kubernetes::service_resource;

use super::ResourceDefinition;

/// Resource type name of the production address.
pub const COMPUTE_ADDRESS: &str = "google_compute_address";
/// Resource type name of the beta address.
pub const COMPUTE_BETA_ADDRESS: &str = "google_compute_beta_address";
/// Resource type name of the production instance group manager.
pub const COMPUTE_INSTANCE_GROUP_MANAGER: &str = "google_compute_instance_group_manager";
/// Resource type name of the beta instance group manager.
pub const COMPUTE_BETA_INSTANCE_GROUP_MANAGER: &str = "google_compute_beta_instance_group_manager";
/// Resource type name of the Bigtable instance.
pub const BIGTABLE_INSTANCE: &str = "google_bigtable_instance";
/// Resource type name of the Bigtable column family.
pub const BIGTABLE_FAMILY: &str = "google_bigtable_family";
/// Resource type name of the Kubernetes service.
pub const KUBERNETES_SERVICE: &str = "kubernetes_service";

/// Read-only map of registered resource types.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    resources: BTreeMap<String, ResourceDefinition>,
}

/// Collects definitions and validates them once.
#[derive(Debug, Default)]
pub struct ProviderRegistryBuilder {
    resources: Vec<(String, ResourceDefinition)>,
}

impl ProviderRegistryBuilder {
    /// Adds a resource type.
    #[must_use]
    pub fn register(mut self, name: &str, definition: ResourceDefinition) -> Self {
        self.resources.push((name.to_string(), definition));
        self
    }

    /// Validates every schema and freezes the registry.
    ///
    /// # Errors
    ///
    /// Returns an error when a name is registered twice or a schema is
    /// inconsistent.
    pub fn build(self) -> Result<ProviderRegistry> {
        let mut resources = BTreeMap::new();
        for (name, definition) in self.resources {
            definition
                .schema
                .internal_validate(&name, definition.supports_update())?;
            if resources.contains_key(&name) {
                return Err(LifecycleError::DuplicateResource { resource_type: name }.into());
            }
            debug!("Registered resource type {name}");
            resources.insert(name, definition);
        }
        Ok(ProviderRegistry { resources })
    }
}

impl ProviderRegistry {
    /// Starts an empty registry.
    #[must_use]
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::default()
    }

    /// Registry of every built-in resource type.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in schema is inconsistent.
    pub fn standard() -> Result<Self> {
        Self::builder()
            .register(BIGTABLE_INSTANCE, bigtable_instance_resource())
            .register(BIGTABLE_FAMILY, bigtable_family_resource())
            .register(COMPUTE_ADDRESS, compute_address_resource(ApiLevel::Production))
            .register(COMPUTE_BETA_ADDRESS, compute_address_resource(ApiLevel::Beta))
            .register(
                COMPUTE_INSTANCE_GROUP_MANAGER,
                instance_group_manager_resource(ApiLevel::Production),
            )
            .register(
                COMPUTE_BETA_INSTANCE_GROUP_MANAGER,
                instance_group_manager_resource(ApiLevel::Beta),
            )
            .register(KUBERNETES_SERVICE, service_resource())
            .build()
    }

    /// Looks up a resource type.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::UnknownResource`] for unregistered names.
    pub fn get(&self, name: &str) -> Result<&ResourceDefinition> {
        self.resources.get(name).ok_or_else(|| {
            LifecycleError::UnknownResource {
                resource_type: name.to_string(),
            }
            .into()
        })
    }

    /// Iterates over registered types in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceDefinition)> {
        self.resources.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SkyforgeError;

    #[test]
    fn test_standard_registry() {
        let registry = ProviderRegistry::standard().expect("built-in schemas should validate");
        assert_eq!(registry.len(), 7);

        let names: Vec<&str> = registry.iter().map(|(name, _)| name).collect();
        assert!(names.contains(&KUBERNETES_SERVICE));
        assert!(names.contains(&COMPUTE_BETA_INSTANCE_GROUP_MANAGER));

        let address = registry.get(COMPUTE_ADDRESS).expect("address");
        assert!(!address.supports_update());
        assert!(!address.schema.contains("address"));
        let beta = registry.get(COMPUTE_BETA_ADDRESS).expect("beta address");
        assert_eq!(beta.api_level, Some(ApiLevel::Beta));
        assert!(beta.schema.contains("address"));

        assert!(registry.get(COMPUTE_INSTANCE_GROUP_MANAGER).expect("igm").supports_update());
        assert!(registry.get(BIGTABLE_FAMILY).expect("family").supports_update());
    }

    #[test]
    fn test_unknown_resource() {
        let registry = ProviderRegistry::standard().expect("registry");
        assert!(matches!(
            registry.get("google_compute_network"),
            Err(SkyforgeError::Lifecycle(LifecycleError::UnknownResource { .. }))
        ));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let result = ProviderRegistry::builder()
            .register(KUBERNETES_SERVICE, service_resource())
            .register(KUBERNETES_SERVICE, service_resource())
            .build();
        assert!(matches!(
            result,
            Err(SkyforgeError::Lifecycle(LifecycleError::DuplicateResource { .. }))
        ));
    }
}
