//! Operation handles and polled status.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::api_level::ApiLevel;
use crate::error::{OperationFault, Result};

/// Where an operation lives and therefore which endpoint polls it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationScope {
    /// Global operations.
    Global,
    /// Regional operations, polled through the region endpoint.
    Regional(String),
    /// Zonal operations, polled through the zone endpoint.
    Zonal(String),
}

impl fmt::Display for OperationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Regional(region) => write!(f, "region {region}"),
            Self::Zonal(zone) => write!(f, "zone {zone}"),
        }
    }
}

/// Status reported by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationStatus {
    /// Accepted, not started.
    #[default]
    Pending,
    /// In progress.
    Running,
    /// Finished, successfully or not.
    Done,
}

/// A polled operation in API-independent form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Operation {
    /// Server-assigned operation name.
    pub name: String,
    /// Current status.
    pub status: OperationStatus,
    /// Errors reported once the operation is done.
    pub errors: Vec<OperationFault>,
    /// URL of the resource the operation acts on.
    pub target_link: Option<String>,
}

impl Operation {
    /// Returns true once the operation is done.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status == OperationStatus::Done
    }
}

/// Everything needed to poll one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    /// Global, regional or zonal.
    pub scope: OperationScope,
    /// Owning project.
    pub project: String,
    /// Operation name.
    pub name: String,
    /// API level the operation was created through.
    pub api_level: ApiLevel,
}

impl OperationHandle {
    /// A zonal operation handle.
    #[must_use]
    pub fn zonal(project: &str, zone: &str, operation: &Operation, api_level: ApiLevel) -> Self {
        Self {
            scope: OperationScope::Zonal(zone.to_string()),
            project: project.to_string(),
            name: operation.name.clone(),
            api_level,
        }
    }

    /// A regional operation handle.
    #[must_use]
    pub fn regional(project: &str, region: &str, operation: &Operation, api_level: ApiLevel) -> Self {
        Self {
            scope: OperationScope::Regional(region.to_string()),
            project: project.to_string(),
            name: operation.name.clone(),
            api_level,
        }
    }

    /// A global operation handle.
    #[must_use]
    pub fn global(project: &str, operation: &Operation, api_level: ApiLevel) -> Self {
        Self {
            scope: OperationScope::Global,
            project: project.to_string(),
            name: operation.name.clone(),
            api_level,
        }
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, project {})", self.name, self.scope, self.project)
    }
}

/// Fetches the current state of an operation.
#[async_trait]
pub trait OperationPoller: Send + Sync {
    /// Polls the operation once.
    ///
    /// # Errors
    ///
    /// Returns an error if the status cannot be fetched.
    async fn poll(&self, handle: &OperationHandle) -> Result<Operation>;
}
