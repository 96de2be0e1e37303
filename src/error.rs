//! Error types for the Skyforge resource providers.
//!
//! This module provides the error hierarchy shared by every lifecycle
//! handler: provider configuration, local schema validation, remote API
//! failures, long-running operation outcomes, and lifecycle-level faults.
//! Remote errors are wrapped with an operation label while the underlying
//! kind stays queryable through [`SkyforgeError::is_not_found`] and friends.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Skyforge providers.
#[derive(Debug, Error)]
pub enum SkyforgeError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Local validation errors raised before any network call.
    #[error("Validation error: {0}")]
    Schema(#[from] SchemaError),

    /// Persisted state file errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Remote API errors.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// Long-running operation errors.
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// Lifecycle errors.
    #[error("{0}")]
    Lifecycle(#[from] LifecycleError),

    /// An error wrapped with the label of the operation that produced it.
    #[error("{label}: {source}")]
    Labeled {
        /// Operation label, e.g. "Error creating Address".
        label: String,
        /// The underlying error.
        source: Box<SkyforgeError>,
    },

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// No project was given on the resource nor as a provider default.
    #[error("{resource}: required field 'project' is not set and the provider has no default project")]
    MissingProject {
        /// Resource type that needed the project.
        resource: String,
    },

    /// No region was given on the resource nor as a provider default.
    #[error("{resource}: required field 'region' is not set and the provider has no default region")]
    MissingRegion {
        /// Resource type that needed the region.
        resource: String,
    },
}

/// Local validation errors against a resource schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A required attribute is missing.
    #[error("{key}: required field is not set")]
    MissingRequired {
        /// Attribute path.
        key: String,
    },

    /// The attribute is not declared by the schema.
    #[error("{key}: unknown attribute")]
    UnknownAttribute {
        /// Attribute path.
        key: String,
    },

    /// The value has the wrong type.
    #[error("{key}: expected {expected}, got {found}")]
    TypeMismatch {
        /// Attribute path.
        key: String,
        /// Expected type name.
        expected: String,
        /// Found type name.
        found: String,
    },

    /// A validation predicate rejected the value.
    #[error("{key}: {message}")]
    Invalid {
        /// Attribute path.
        key: String,
        /// Predicate message.
        message: String,
    },

    /// A computed-only attribute was set in configuration.
    #[error("{key}: computed attributes cannot be set")]
    ComputedSet {
        /// Attribute path.
        key: String,
    },

    /// The schema itself is inconsistent.
    #[error("{resource}.{key}: {message}")]
    InvalidSchema {
        /// Resource type.
        resource: String,
        /// Attribute path.
        key: String,
        /// What is wrong.
        message: String,
    },

    /// The persisted state could not be decoded.
    #[error("Corrupted state at {key}: {message}")]
    CorruptedState {
        /// Flat key.
        key: String,
        /// Description of the problem.
        message: String,
    },
}

/// Persisted state file errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// The state file could not be parsed.
    #[error("State file {path} is corrupted: {message}")]
    Corrupted {
        /// Path to the state file.
        path: PathBuf,
        /// Description of the corruption.
        message: String,
    },

    /// The state could not be serialized.
    #[error("State serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
    },

    /// The state belongs to a different resource type.
    #[error("State holds {found}, expected {expected}")]
    TypeMismatch {
        /// Expected resource type.
        expected: String,
        /// Resource type found in the state.
        found: String,
    },
}

/// Remote API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The remote resource does not exist (HTTP 404).
    #[error("Not found: {message}")]
    NotFound {
        /// Error message from the API.
        message: String,
    },

    /// Authentication failed.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("API request failed: {status} - {message}")]
    RequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from API.
        message: String,
    },

    /// Rate limited.
    #[error("API rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("Network error: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from API.
    #[error("Invalid response from API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// A single error reported by a finished operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFault {
    /// Server error code.
    pub code: String,
    /// Server error message.
    pub message: String,
}

impl std::fmt::Display for OperationFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Long-running operation errors.
#[derive(Debug, Error)]
pub enum OperationError {
    /// The operation finished with errors.
    #[error("Operation {operation} failed: {}", format_faults(.faults))]
    Failed {
        /// Operation name.
        operation: String,
        /// Errors reported by the server.
        faults: Vec<OperationFault>,
    },

    /// The operation did not finish within the wait budget.
    #[error("Timeout while {activity}: operation {operation} still running after {waited_secs}s")]
    Timeout {
        /// Operation name.
        operation: String,
        /// Activity label.
        activity: String,
        /// Seconds spent waiting.
        waited_secs: u64,
    },

    /// The caller's context was cancelled or its deadline passed.
    #[error("Cancelled while {activity}")]
    Cancelled {
        /// Activity label.
        activity: String,
    },
}

fn format_faults(faults: &[OperationFault]) -> String {
    faults
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Lifecycle-level errors.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The resource type is not registered.
    #[error("Unknown resource type: {resource_type}")]
    UnknownResource {
        /// Requested type name.
        resource_type: String,
    },

    /// A resource type was registered twice.
    #[error("Resource type registered twice: {resource_type}")]
    DuplicateResource {
        /// Duplicated type name.
        resource_type: String,
    },

    /// The handler does not implement the operation.
    #[error("{resource_type} does not support {operation}")]
    Unsupported {
        /// Resource type name.
        resource_type: String,
        /// Operation name.
        operation: String,
    },

    /// An instance group delete stopped making progress.
    #[error("Error, instance group isn't shrinking during delete: {name} stalled at {size} instances")]
    NotShrinking {
        /// Instance group manager name.
        name: String,
        /// Size observed on two consecutive probes.
        size: i64,
    },

    /// An import ID did not have the expected shape.
    #[error("Invalid import ID {id:?}, expected {expected}")]
    InvalidImportId {
        /// Supplied ID.
        id: String,
        /// Expected format.
        expected: String,
    },
}

/// Result type alias for Skyforge operations.
pub type Result<T> = std::result::Result<T, SkyforgeError>;

impl SkyforgeError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Wraps this error with an operation label.
    #[must_use]
    pub fn labeled(self, label: impl Into<String>) -> Self {
        Self::Labeled {
            label: label.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping operation labels.
    #[must_use]
    pub fn root(&self) -> &Self {
        let mut current = self;
        while let Self::Labeled { source, .. } = current {
            current = source;
        }
        current
    }

    /// Returns true if the remote reported that the resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::Api(ApiError::NotFound { .. }))
    }

    /// Returns true if this error is transient and the call may be retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self.root() {
            Self::Api(ApiError::RateLimited { .. } | ApiError::Network { .. }) => true,
            Self::Api(ApiError::RequestFailed { status, .. }) => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if an operation wait ran out of time.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), Self::Operation(OperationError::Timeout { .. }))
    }

    /// Returns true if the caller's context was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.root(),
            Self::Operation(OperationError::Cancelled { .. })
        )
    }

    /// Returns true for local validation errors.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self.root(), Self::Schema(_))
    }

    /// Returns the HTTP status of a remote error, if any.
    #[must_use]
    pub fn api_status(&self) -> Option<u16> {
        match self.root() {
            Self::Api(ApiError::NotFound { .. }) => Some(404),
            Self::Api(ApiError::RateLimited { .. }) => Some(429),
            Self::Api(ApiError::RequestFailed { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub fn retry_delay_secs(&self) -> Option<u64> {
        match self.root() {
            Self::Api(ApiError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            Self::Api(ApiError::Network { .. }) => Some(2),
            Self::Api(ApiError::RequestFailed { status, .. }) if *status >= 500 => Some(1),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl SchemaError {
    /// Creates a predicate failure for the given attribute.
    #[must_use]
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn mismatch(
        key: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            key: key.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }
}

impl ApiError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}

impl LifecycleError {
    /// Creates an unsupported-operation error.
    #[must_use]
    pub fn unsupported(resource_type: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Unsupported {
            resource_type: resource_type.into(),
            operation: operation.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labeled_keeps_root_kind() {
        let err = SkyforgeError::from(ApiError::not_found("address gone"))
            .labeled("Error reading Address");

        assert!(err.is_not_found());
        assert!(!err.is_retryable());
        assert_eq!(err.api_status(), Some(404));
        assert_eq!(
            err.to_string(),
            "Error reading Address: Not found: address gone"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(SkyforgeError::from(ApiError::api_error(503, "unavailable")).is_retryable());
        assert!(SkyforgeError::from(ApiError::network("reset")).is_retryable());
        assert!(
            SkyforgeError::from(ApiError::RateLimited {
                retry_after_secs: 3
            })
            .is_retryable()
        );
        assert!(!SkyforgeError::from(ApiError::api_error(400, "bad")).is_retryable());
    }

    #[test]
    fn test_operation_failure_message() {
        let err = SkyforgeError::from(OperationError::Failed {
            operation: "operation-1".to_string(),
            faults: vec![
                OperationFault {
                    code: "QUOTA_EXCEEDED".to_string(),
                    message: "Quota 'ADDRESSES' exceeded".to_string(),
                },
                OperationFault {
                    code: "RESOURCE_IN_USE".to_string(),
                    message: "in use".to_string(),
                },
            ],
        });

        assert_eq!(
            err.to_string(),
            "Operation operation-1 failed: QUOTA_EXCEEDED: Quota 'ADDRESSES' exceeded; RESOURCE_IN_USE: in use"
        );
    }

    #[test]
    fn test_timeout_is_distinct_kind() {
        let err = SkyforgeError::from(OperationError::Timeout {
            operation: "op".to_string(),
            activity: "Deleting InstanceGroupManager".to_string(),
            waited_secs: 240,
        })
        .labeled("Error deleting InstanceGroupManager");

        assert!(err.is_timeout());
        assert!(!err.is_cancelled());
        assert!(!err.is_not_found());
    }
}
