//! Kubernetes `v1` object shapes used by the service resource.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Standard object metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
    /// Object name.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Prefix used by the server to generate a unique name.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub generate_name: String,
    /// Namespace.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Labels.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Generation of the desired state.
    #[serde(skip_serializing_if = "is_zero")]
    pub generation: i64,
    /// Opaque version for optimistic concurrency.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    /// Server URL of the object.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub self_link: String,
    /// Server-assigned unique ID.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uid: String,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(n: &i64) -> bool {
    *n == 0
}

/// A port number or a named container port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntOrString {
    /// Numeric port.
    Int(i64),
    /// Named port.
    String(String),
}

impl Default for IntOrString {
    fn default() -> Self {
        Self::Int(0)
    }
}

impl IntOrString {
    /// Returns the numeric value, parsing numeric strings and mapping names to 0.
    #[must_use]
    pub fn int_value(&self) -> i64 {
        match self {
            Self::Int(n) => *n,
            Self::String(s) => s.parse().unwrap_or_default(),
        }
    }
}

/// One port exposed by a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServicePort {
    /// Port name.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Node port, assigned by the server when zero.
    #[serde(skip_serializing_if = "is_zero")]
    pub node_port: i64,
    /// Service port.
    pub port: i64,
    /// `TCP` or `UDP`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    /// Port on the selected pods.
    pub target_port: IntOrString,
}

/// Desired behaviour of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceSpec {
    /// Virtual IP.
    #[serde(rename = "clusterIP", skip_serializing_if = "String::is_empty")]
    pub cluster_ip: String,
    /// Extra IPs accepted by every node.
    #[serde(rename = "externalIPs", skip_serializing_if = "Vec::is_empty")]
    pub external_ips: Vec<String>,
    /// CNAME target of an `ExternalName` service.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub external_name: String,
    /// Requested load balancer IP.
    #[serde(rename = "loadBalancerIP", skip_serializing_if = "String::is_empty")]
    pub load_balancer_ip: String,
    /// Client CIDRs allowed through the load balancer.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub load_balancer_source_ranges: Vec<String>,
    /// Exposed ports.
    pub ports: Vec<ServicePort>,
    /// Pod selector.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
    /// `ClientIP` or `None`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub session_affinity: String,
    /// `ClusterIP`, `NodePort`, `LoadBalancer` or `ExternalName`.
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub type_: String,
}

/// A `v1/Service`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Service {
    /// Always `v1`.
    pub api_version: String,
    /// Always `Service`.
    pub kind: String,
    /// Metadata.
    pub metadata: ObjectMeta,
    /// Spec.
    pub spec: ServiceSpec,
}

impl Service {
    /// Creates a service object with the `v1` type header.
    #[must_use]
    pub fn new(metadata: ObjectMeta, spec: ServiceSpec) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "Service".to_string(),
            metadata,
            spec,
        }
    }
}
