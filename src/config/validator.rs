//! Configuration validation for provider settings.
//!
//! Catches malformed endpoints and nonsensical retry schedules before any
//! request is sent.

use reqwest::Url;
use tracing::debug;

use crate::error::{ConfigError, Result, SkyforgeError};

use super::spec::{ProviderConfig, RetrySettings};
use crate::operation::WaitSettings;

/// Validator for provider configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ValidationResult {
    fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.into(),
        });
    }
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a provider configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate(&self, config: &ProviderConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_google(config, &mut result);
        Self::validate_kubernetes(config, &mut result);
        Self::validate_waiter(&config.waiter, &mut result);
        Self::validate_delete_retry(&config.delete_retry, &mut result);

        if config.http.timeout_secs == 0 {
            result.error("http.timeout_secs", "HTTP timeout must be at least 1 second");
        }

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(SkyforgeError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    fn validate_google(config: &ProviderConfig, result: &mut ValidationResult) {
        let google = &config.google;

        for (field, endpoint) in [
            ("google.compute_endpoint", &google.compute_endpoint),
            ("google.bigtable_admin_endpoint", &google.bigtable_admin_endpoint),
        ] {
            if let Err(message) = check_endpoint(endpoint) {
                result.error(field, message);
            }
        }

        match google.project.as_deref() {
            Some("") => result.error("google.project", "Project cannot be empty"),
            None => result
                .warnings
                .push(String::from("No default project; every resource must set one")),
            Some(_) => {}
        }

        if let Some(region) = google.region.as_deref() {
            if !is_valid_region(region) {
                result.error(
                    "google.region",
                    format!("Region '{region}' is invalid. Expected a name like 'us-central1'."),
                );
            }
        }

        if google.access_token.is_none() {
            result
                .warnings
                .push(String::from("No Google access token configured"));
        }
    }

    fn validate_kubernetes(config: &ProviderConfig, result: &mut ValidationResult) {
        if let Some(host) = config.kubernetes.host.as_deref() {
            if let Err(message) = check_endpoint(host) {
                result.error("kubernetes.host", message);
            }
        }
        if config.kubernetes.insecure {
            result
                .warnings
                .push(String::from("TLS verification of the Kubernetes API is disabled"));
        }
    }

    fn validate_waiter(waiter: &WaitSettings, result: &mut ValidationResult) {
        if waiter.initial_interval_ms == 0 {
            result.error("waiter.initial_interval_ms", "Poll interval must be positive");
        }
        if waiter.initial_interval_ms > waiter.max_interval_ms {
            result.error(
                "waiter.max_interval_ms",
                "Maximum poll interval must not be below the initial interval",
            );
        }
        if waiter.multiplier < 1.0 {
            result.error("waiter.multiplier", "Backoff multiplier must be at least 1.0");
        }
        if !(0.0..1.0).contains(&waiter.jitter) {
            result.error("waiter.jitter", "Jitter must be in [0, 1)");
        }
        if waiter.timeout_secs == 0 {
            result.error("waiter.timeout_secs", "Operation timeout must be positive");
        }
    }

    fn validate_delete_retry(retry: &RetrySettings, result: &mut ValidationResult) {
        if retry.attempts == 0 {
            result.error("delete_retry.attempts", "At least one delete attempt is required");
        }
        if retry.multiplier < 1.0 {
            result.error("delete_retry.multiplier", "Retry multiplier must be at least 1.0");
        }
        if retry.spacing_ms > retry.max_spacing_ms {
            result.error(
                "delete_retry.max_spacing_ms",
                "Maximum retry spacing must not be below the base spacing",
            );
        }
    }
}

fn check_endpoint(endpoint: &str) -> std::result::Result<(), String> {
    let url = Url::parse(endpoint).map_err(|e| format!("Invalid URL '{endpoint}': {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("Unsupported URL scheme '{other}' in '{endpoint}'")),
    }
}

/// Regions look like `us-central1` or `europe-west4`.
fn is_valid_region(region: &str) -> bool {
    let mut parts = region.split('-');
    let (Some(area), Some(location), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !area.is_empty()
        && area.chars().all(|c| c.is_ascii_lowercase())
        && location.chars().next().is_some_and(|c| c.is_ascii_lowercase())
        && location.chars().last().is_some_and(|c| c.is_ascii_digit())
        && location.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ProviderConfig {
        let mut config = ProviderConfig::default();
        config.google.project = Some(String::from("my-project"));
        config.google.region = Some(String::from("us-central1"));
        config.google.access_token = Some(String::from("token"));
        config
    }

    #[test]
    fn test_valid_config() {
        let result = ConfigValidator::new().validate(&valid_config());
        let result = result.expect("config should be valid");
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_missing_project_warns() {
        let mut config = valid_config();
        config.google.project = None;
        let result = ConfigValidator::new()
            .validate(&config)
            .expect("missing project is not fatal");
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_invalid_endpoint() {
        let mut config = valid_config();
        config.google.compute_endpoint = String::from("not a url");
        let err = ConfigValidator::new()
            .validate(&config)
            .expect_err("endpoint should be rejected");
        assert!(matches!(
            err,
            SkyforgeError::Config(ConfigError::ValidationError { field: Some(ref f), .. })
                if f == "google.compute_endpoint"
        ));
    }

    #[test]
    fn test_region_names() {
        assert!(is_valid_region("us-central1"));
        assert!(is_valid_region("europe-west4"));
        assert!(!is_valid_region("us-central1-a"));
        assert!(!is_valid_region("US-central1"));
        assert!(!is_valid_region("uscentral"));
    }

    #[test]
    fn test_waiter_bounds() {
        let mut config = valid_config();
        config.waiter.initial_interval_ms = 20_000;
        assert!(ConfigValidator::new().validate(&config).is_err());

        let mut config = valid_config();
        config.waiter.jitter = 1.0;
        assert!(ConfigValidator::new().validate(&config).is_err());
    }

    #[test]
    fn test_delete_retry_requires_attempt() {
        let mut config = valid_config();
        config.delete_retry.attempts = 0;
        assert!(ConfigValidator::new().validate(&config).is_err());
    }
}
