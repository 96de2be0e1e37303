//! Kubernetes core `v1` resources.

mod client;
mod metadata;
mod patch;
mod service;
pub mod types;

#[cfg(test)]
pub use client::MockKubernetesApi;
pub use client::{KubeClient, KubernetesApi};
pub use metadata::{build_id, expand_metadata, flatten_metadata, id_parts, namespaced_metadata_schema, patch_metadata};
pub use patch::{PatchOperation, PatchOperations, diff_string_map, escape_json_pointer};
pub use service::{ServiceResource, service_resource};
