//! Kubernetes API client.

use async_trait::async_trait;
use tracing::debug;

use crate::config::{HttpConfig, KubernetesConfig};
use crate::error::{ConfigError, Result};
use crate::http::{JSON_PATCH, RestClient};

use super::patch::PatchOperations;
use super::types::Service;

/// Core `v1` service operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KubernetesApi: Send + Sync {
    /// Creates a service.
    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service>;

    /// Fetches a service.
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service>;

    /// Applies a JSON Patch to a service.
    async fn patch_service(&self, namespace: &str, name: &str, patch: &PatchOperations) -> Result<Service>;

    /// Deletes a service.
    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()>;
}

/// HTTP client for one API server.
#[derive(Debug, Clone)]
pub struct KubeClient {
    rest: RestClient,
    host: String,
}

impl KubeClient {
    /// Creates a client from the provider settings.
    ///
    /// # Errors
    ///
    /// Returns an error if no API server is configured or the HTTP client
    /// cannot be created.
    pub fn new(kubernetes: &KubernetesConfig, http: &HttpConfig) -> Result<Self> {
        let host = kubernetes
            .host
            .as_deref()
            .ok_or_else(|| ConfigError::validation("No Kubernetes API server configured", "kubernetes.host"))?;
        let http = HttpConfig {
            insecure: http.insecure || kubernetes.insecure,
            ..http.clone()
        };
        Ok(Self {
            rest: RestClient::new(&http, kubernetes.token.clone())?,
            host: host.trim_end_matches('/').to_string(),
        })
    }

    fn services_url(&self, namespace: &str) -> String {
        format!("{}/api/v1/namespaces/{namespace}/services", self.host)
    }
}

#[async_trait]
impl KubernetesApi for KubeClient {
    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service> {
        debug!("POST service {}/{}", namespace, service.metadata.name);
        self.rest
            .post(&self.services_url(namespace), service, false)
            .await
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service> {
        self.rest
            .get(&format!("{}/{name}", self.services_url(namespace)))
            .await
    }

    async fn patch_service(&self, namespace: &str, name: &str, patch: &PatchOperations) -> Result<Service> {
        debug!("PATCH service {namespace}/{name} with {} operations", patch.len());
        self.rest
            .patch(&format!("{}/{name}", self.services_url(namespace)), patch, JSON_PATCH)
            .await
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()> {
        let _: serde_json::Value = self
            .rest
            .delete(&format!("{}/{name}", self.services_url(namespace)), true)
            .await?;
        Ok(())
    }
}
