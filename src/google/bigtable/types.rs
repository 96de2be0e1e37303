//! Bigtable Admin types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{OperationFault, SchemaError};
use crate::operation::{Operation, OperationStatus};

/// Storage medium of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// Hard disk.
    Hdd,
    /// Solid state.
    Ssd,
}

impl StorageType {
    /// The name used in configuration and by the API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hdd => "HDD",
            Self::Ssd => "SSD",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HDD" => Ok(Self::Hdd),
            "SSD" => Ok(Self::Ssd),
            other => Err(SchemaError::invalid(
                "storage_type",
                format!("Invalid BigTable Instance storage_type. Saw: {other}"),
            )),
        }
    }
}

/// Everything needed to create a single-cluster instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceConf {
    /// Instance ID.
    pub instance_id: String,
    /// Human readable name.
    pub display_name: String,
    /// ID of the only cluster.
    pub cluster_id: String,
    /// Zone of the cluster.
    pub zone: String,
    /// Serving nodes.
    pub num_nodes: i64,
    /// Storage medium.
    pub storage_type: StorageType,
}

/// An instance as listed by the instance admin API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    /// Instance ID, the last segment of the resource name.
    pub name: String,
    /// Human readable name.
    pub display_name: String,
}

/// A cluster of an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInfo {
    /// Cluster ID.
    pub name: String,
    /// Zone, the last segment of the location.
    pub zone: String,
    /// Serving nodes.
    pub serve_nodes: i64,
    /// Storage medium name, `HDD` or `SSD`.
    pub storage_type: String,
}

/// Garbage collection rule of a column family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GcPolicy {
    /// Keep at most this many versions of each cell.
    MaxVersions(i64),
    /// Keep cells younger than this duration, e.g. `86400s`.
    MaxAge(String),
    /// No automatic collection.
    None,
}

impl GcPolicy {
    /// Returns the version limit of a version-based policy.
    #[must_use]
    pub const fn max_versions(&self) -> Option<i64> {
        match self {
            Self::MaxVersions(n) => Some(*n),
            _ => None,
        }
    }

    /// Parses the rendered form back into a policy.
    #[must_use]
    pub fn parse(rendered: &str) -> Self {
        let rendered = rendered.trim();
        if let Some(n) = rendered
            .strip_prefix("versions() > ")
            .and_then(|n| n.parse().ok())
        {
            return Self::MaxVersions(n);
        }
        match rendered.strip_prefix("age() > ") {
            Some(age) => Self::MaxAge(age.to_string()),
            None => Self::None,
        }
    }

    pub(crate) fn to_wire(&self) -> GcRule {
        match self {
            Self::MaxVersions(n) => GcRule {
                max_num_versions: Some(*n),
                max_age: None,
            },
            Self::MaxAge(age) => GcRule {
                max_num_versions: None,
                max_age: Some(age.clone()),
            },
            Self::None => GcRule::default(),
        }
    }

    pub(crate) fn from_wire(rule: Option<GcRule>) -> Self {
        match rule {
            Some(GcRule {
                max_num_versions: Some(n),
                ..
            }) => Self::MaxVersions(n),
            Some(GcRule {
                max_age: Some(age), ..
            }) => Self::MaxAge(age),
            _ => Self::None,
        }
    }
}

impl fmt::Display for GcPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxVersions(n) => write!(f, "versions() > {n}"),
            Self::MaxAge(age) => write!(f, "age() > {age}"),
            Self::None => Ok(()),
        }
    }
}

/// A column family and its rendered GC policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyInfo {
    /// Family name.
    pub name: String,
    /// Rendered policy, e.g. `versions() > 1`.
    pub gc_policy: String,
}

/// A table and its families.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableInfo {
    /// Column families, sorted by name.
    pub families: Vec<FamilyInfo>,
}

impl TableInfo {
    /// Finds a family by name.
    #[must_use]
    pub fn family(&self, name: &str) -> Option<&FamilyInfo> {
        self.families.iter().find(|f| f.name == name)
    }
}

/// Wire form of a GC rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GcRule {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "int64_string"
    )]
    pub max_num_versions: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<String>,
}

/// Admin API integers arrive as JSON numbers or decimal strings.
mod int64_string {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(n) => serializer.serialize_i64(*n),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Number(n)) => Ok(Some(n)),
            Some(Raw::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

/// A `google.longrunning.Operation`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct LongRunningOperation {
    pub name: String,
    pub done: bool,
    pub error: Option<RpcStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RpcStatus {
    pub code: i32,
    pub message: String,
}

impl From<LongRunningOperation> for Operation {
    fn from(wire: LongRunningOperation) -> Self {
        let status = if wire.done {
            OperationStatus::Done
        } else {
            OperationStatus::Running
        };
        Self {
            name: wire.name,
            status,
            errors: wire
                .error
                .map(|e| {
                    vec![OperationFault {
                        code: e.code.to_string(),
                        message: e.message,
                    }]
                })
                .unwrap_or_default(),
            target_link: None,
        }
    }
}
