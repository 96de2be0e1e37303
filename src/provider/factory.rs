//! Lazily constructed, cached API clients.
//!
//! Handlers never build clients themselves. They ask a [`ClientFactory`],
//! which tests replace with fakes.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::api_level::ApiLevel;
use crate::config::ProviderConfig;
use crate::error::{Result, SkyforgeError};
use crate::google::bigtable::{InstanceAdminApi, InstanceAdminClient, TableAdminApi, TableAdminClient};
use crate::google::compute::{ComputeApi, ComputeClient};
use crate::kubernetes::{KubeClient, KubernetesApi};

/// Source of API clients for lifecycle handlers.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Compute client speaking `level`.
    async fn compute(&self, level: ApiLevel) -> Result<Arc<dyn ComputeApi>>;

    /// Bigtable instance admin client for `project`.
    async fn bigtable_instance_admin(&self, project: &str) -> Result<Arc<dyn InstanceAdminApi>>;

    /// Bigtable table admin client for `project`/`instance`.
    async fn bigtable_admin(&self, project: &str, instance: &str) -> Result<Arc<dyn TableAdminApi>>;

    /// Kubernetes API client.
    async fn kubernetes(&self) -> Result<Arc<dyn KubernetesApi>>;
}

/// Keyed cache that builds each value at most once.
///
/// Concurrent requests for the same key wait for a single construction.
/// A failed construction is not cached.
pub struct ClientCache<K, V> {
    cells: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for ClientCache<K, V> {
    fn default() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> fmt::Debug for ClientCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.cells.lock().map_or(0, |cells| cells.len());
        f.debug_struct("ClientCache").field("entries", &len).finish()
    }
}

impl<K, V> ClientCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value for `key`, building it with `init` if needed.
    ///
    /// # Errors
    ///
    /// Returns the construction error; the next call retries.
    pub async fn get_or_try_init<F, Fut>(&self, key: K, init: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let cell = {
            let mut cells = self
                .cells
                .lock()
                .map_err(|_| SkyforgeError::internal("client cache lock poisoned"))?;
            Arc::clone(cells.entry(key).or_default())
        };
        cell.get_or_try_init(init).await.cloned()
    }

    /// Returns the number of keys seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.lock().map_or(0, |cells| cells.len())
    }

    /// Returns true when no key was requested yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds HTTP clients from the provider configuration.
#[derive(Debug)]
pub struct HttpClientFactory {
    config: Arc<ProviderConfig>,
    compute: ClientCache<ApiLevel, Arc<dyn ComputeApi>>,
    instance_admin: ClientCache<String, Arc<dyn InstanceAdminApi>>,
    table_admin: ClientCache<(String, String), Arc<dyn TableAdminApi>>,
    kubernetes: ClientCache<(), Arc<dyn KubernetesApi>>,
}

impl HttpClientFactory {
    /// Creates a factory. No client is built until first use.
    #[must_use]
    pub fn new(config: Arc<ProviderConfig>) -> Self {
        Self {
            config,
            compute: ClientCache::new(),
            instance_admin: ClientCache::new(),
            table_admin: ClientCache::new(),
            kubernetes: ClientCache::new(),
        }
    }
}

#[async_trait]
impl ClientFactory for HttpClientFactory {
    async fn compute(&self, level: ApiLevel) -> Result<Arc<dyn ComputeApi>> {
        self.compute
            .get_or_try_init(level, || async move {
                debug!("Creating Compute client at {level}");
                let client = ComputeClient::new(&self.config.google, &self.config.http, level)?;
                Ok(Arc::new(client) as Arc<dyn ComputeApi>)
            })
            .await
    }

    async fn bigtable_instance_admin(&self, project: &str) -> Result<Arc<dyn InstanceAdminApi>> {
        self.instance_admin
            .get_or_try_init(project.to_string(), || async move {
                debug!("Creating Bigtable instance admin client for {project}");
                let client = InstanceAdminClient::new(&self.config.google, &self.config.http, project)
                    .map_err(|e| e.labeled("Error starting instance admin client"))?;
                Ok(Arc::new(client) as Arc<dyn InstanceAdminApi>)
            })
            .await
    }

    async fn bigtable_admin(&self, project: &str, instance: &str) -> Result<Arc<dyn TableAdminApi>> {
        self.table_admin
            .get_or_try_init((project.to_string(), instance.to_string()), || async move {
                debug!("Creating Bigtable admin client for {project}/{instance}");
                let client =
                    TableAdminClient::new(&self.config.google, &self.config.http, project, instance)
                        .map_err(|e| e.labeled("Error starting admin client"))?;
                Ok(Arc::new(client) as Arc<dyn TableAdminApi>)
            })
            .await
    }

    async fn kubernetes(&self) -> Result<Arc<dyn KubernetesApi>> {
        self.kubernetes
            .get_or_try_init((), || async move {
                debug!("Creating Kubernetes client");
                let client = KubeClient::new(&self.config.kubernetes, &self.config.http)?;
                Ok(Arc::new(client) as Arc<dyn KubernetesApi>)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_single_flight_per_key() {
        let cache: Arc<ClientCache<String, Arc<usize>>> = Arc::new(ClientCache::new());
        let builds = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let builds = Arc::clone(&builds);
            tasks.push(tokio::spawn(async move {
                cache
                    .get_or_try_init("p".to_string(), || async move {
                        builds.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(Arc::new(7))
                    })
                    .await
            }));
        }
        for task in tasks {
            let value = task.await.expect("task").expect("init");
            assert_eq!(*value, 7);
        }

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_init_is_retried() {
        let cache: ClientCache<u8, u8> = ClientCache::new();
        let first = cache
            .get_or_try_init(1, || async { Err(SkyforgeError::internal("boom")) })
            .await;
        assert!(first.is_err());

        let second = cache.get_or_try_init(1, || async { Ok(5) }).await;
        assert_eq!(second.expect("second init"), 5);
    }

    #[tokio::test]
    async fn test_distinct_keys_build_separately() {
        let config = Arc::new(ProviderConfig::default());
        let factory = HttpClientFactory::new(config);

        let v1 = factory.compute(ApiLevel::Production).await.expect("v1 client");
        let beta = factory.compute(ApiLevel::Beta).await.expect("beta client");
        let again = factory.compute(ApiLevel::Beta).await.expect("cached beta client");

        assert_eq!(v1.api_level(), ApiLevel::Production);
        assert_eq!(beta.api_level(), ApiLevel::Beta);
        assert!(Arc::ptr_eq(&beta, &again));
        assert_eq!(factory.compute.len(), 2);
    }

    #[tokio::test]
    async fn test_kubernetes_requires_host() {
        let factory = HttpClientFactory::new(Arc::new(ProviderConfig::default()));
        let err = factory.kubernetes().await.err().expect("no host configured");
        assert!(matches!(err, SkyforgeError::Config(_)));
    }
}
