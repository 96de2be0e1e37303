//! Provider configuration types.
//!
//! These types map to `skyforge.yaml`. Every section has defaults so an
//! empty file (or no file at all) yields a usable configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::operation::WaitSettings;

/// Default Compute Engine endpoint.
pub const DEFAULT_COMPUTE_ENDPOINT: &str = "https://compute.googleapis.com";

/// Default Bigtable Admin endpoint.
pub const DEFAULT_BIGTABLE_ADMIN_ENDPOINT: &str = "https://bigtableadmin.googleapis.com";

/// The root provider configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    /// Google Cloud settings.
    pub google: GoogleConfig,
    /// Kubernetes settings.
    pub kubernetes: KubernetesConfig,
    /// HTTP transport settings.
    pub http: HttpConfig,
    /// Operation polling schedule.
    pub waiter: WaitSettings,
    /// Retry schedule for deletes the API briefly rejects.
    pub delete_retry: RetrySettings,
}

/// Google Cloud settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GoogleConfig {
    /// Default project for resources that do not set one.
    pub project: Option<String>,
    /// Default region for resources that do not set one.
    pub region: Option<String>,
    /// Compute Engine API endpoint.
    pub compute_endpoint: String,
    /// Bigtable Admin API endpoint.
    pub bigtable_admin_endpoint: String,
    /// OAuth access token.
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            project: None,
            region: None,
            compute_endpoint: DEFAULT_COMPUTE_ENDPOINT.to_string(),
            bigtable_admin_endpoint: DEFAULT_BIGTABLE_ADMIN_ENDPOINT.to_string(),
            access_token: None,
        }
    }
}

/// Kubernetes API settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KubernetesConfig {
    /// API server URL.
    pub host: Option<String>,
    /// Bearer token.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Skip TLS verification of the API server.
    pub insecure: bool,
}

/// HTTP transport settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum retries of idempotent requests on transient failures.
    pub max_retries: u32,
    /// Base delay between retries in milliseconds.
    pub retry_delay_ms: u64,
    /// User agent header.
    pub user_agent: String,
    /// Skip TLS verification.
    pub insecure: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 1_000,
            user_agent: format!("skyforge/{}", env!("CARGO_PKG_VERSION")),
            insecure: false,
        }
    }
}

/// Bounded retry schedule.
///
/// With the default multiplier of 1 the spacing is fixed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay before the first retry in milliseconds.
    pub spacing_ms: u64,
    /// Growth factor of the delay after each retry.
    pub multiplier: f64,
    /// Cap on a single delay in milliseconds.
    pub max_spacing_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: 20,
            spacing_ms: 2_000,
            multiplier: 1.0,
            max_spacing_ms: 30_000,
        }
    }
}

impl RetrySettings {
    /// Delay before retry number `retry` (starting at 1).
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.multiplier.max(1.0).powi(exponent);
        let millis = (self.spacing_ms as f64 * factor).min(self.max_spacing_ms.max(self.spacing_ms) as f64);
        Duration::from_millis(millis as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_retry_spacing() {
        let retry = RetrySettings::default();
        assert_eq!(retry.attempts, 20);
        assert_eq!(retry.delay(1), Duration::from_secs(2));
        assert_eq!(retry.delay(19), Duration::from_secs(2));
    }

    #[test]
    fn test_growing_retry_spacing_is_capped() {
        let retry = RetrySettings {
            multiplier: 2.0,
            max_spacing_ms: 10_000,
            ..RetrySettings::default()
        };
        assert_eq!(retry.delay(1), Duration::from_secs(2));
        assert_eq!(retry.delay(2), Duration::from_secs(4));
        assert_eq!(retry.delay(3), Duration::from_secs(8));
        assert_eq!(retry.delay(4), Duration::from_secs(10));
    }

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::default();
        assert_eq!(config.google.compute_endpoint, DEFAULT_COMPUTE_ENDPOINT);
        assert_eq!(config.waiter.initial_interval_ms, 1_000);
        assert_eq!(config.waiter.max_interval_ms, 10_000);
        assert!(config.google.project.is_none());
    }
}
