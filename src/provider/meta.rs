//! Provider-wide settings and clients handed to every handler.

use std::fmt;
use std::sync::Arc;

use crate::config::{ProviderConfig, RetrySettings};
use crate::error::{ConfigError, Result};
use crate::operation::OperationWaiter;
use crate::schema::ResourceData;

use super::factory::{ClientFactory, HttpClientFactory};

/// Shared, read-only provider state.
#[derive(Clone)]
pub struct ProviderMeta {
    config: Arc<ProviderConfig>,
    clients: Arc<dyn ClientFactory>,
    waiter: OperationWaiter,
}

impl fmt::Debug for ProviderMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderMeta")
            .field("config", &self.config)
            .field("waiter", &self.waiter)
            .finish_non_exhaustive()
    }
}

impl ProviderMeta {
    /// Creates provider state with the given client source.
    #[must_use]
    pub fn new(config: ProviderConfig, clients: Arc<dyn ClientFactory>) -> Self {
        let waiter = OperationWaiter::new(config.waiter.clone());
        Self {
            config: Arc::new(config),
            clients,
            waiter,
        }
    }

    /// Creates provider state backed by HTTP clients.
    #[must_use]
    pub fn from_config(config: ProviderConfig) -> Self {
        let config = Arc::new(config);
        let clients = Arc::new(HttpClientFactory::new(Arc::clone(&config)));
        Self {
            waiter: OperationWaiter::new(config.waiter.clone()),
            config,
            clients,
        }
    }

    /// Returns the provider configuration.
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Returns the client source.
    #[must_use]
    pub fn clients(&self) -> &dyn ClientFactory {
        self.clients.as_ref()
    }

    /// Returns the operation waiter.
    #[must_use]
    pub const fn waiter(&self) -> &OperationWaiter {
        &self.waiter
    }

    /// Returns the delete retry schedule.
    #[must_use]
    pub fn delete_retry(&self) -> &RetrySettings {
        &self.config.delete_retry
    }

    /// Resolves the project: the resource's own `project`, else the
    /// provider default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingProject`] when neither is set.
    pub fn project(&self, data: &ResourceData) -> Result<String> {
        resolve(data, "project", self.config.google.project.as_deref()).ok_or_else(|| {
            ConfigError::MissingProject {
                resource: data.resource_type().to_string(),
            }
            .into()
        })
    }

    /// Resolves the region: the resource's own `region`, else the provider
    /// default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRegion`] when neither is set.
    pub fn region(&self, data: &ResourceData) -> Result<String> {
        resolve(data, "region", self.config.google.region.as_deref()).ok_or_else(|| {
            ConfigError::MissingRegion {
                resource: data.resource_type().to_string(),
            }
            .into()
        })
    }
}

fn resolve(data: &ResourceData, key: &str, fallback: Option<&str>) -> Option<String> {
    if data.schema().contains(key) {
        if let Some(value) = data.get_ok(key).and_then(|v| v.as_str().map(str::to_string)) {
            return Some(value);
        }
    }
    fallback.filter(|v| !v.is_empty()).map(str::to_string)
}
