//! The `metadata` block shared by namespaced Kubernetes resources.

use std::collections::BTreeMap;

use crate::error::{LifecycleError, Result};
use crate::schema::{AttributeSchema, Element, ResourceData, ResourceSchema, Value};

use super::patch::{PatchOperations, diff_string_map};
use super::types::ObjectMeta;

fn validate_name(value: &Value) -> std::result::Result<(), String> {
    let name = value.as_str().unwrap_or_default();
    if name.len() > 253 {
        return Err(format!("{name:?} must be no more than 253 characters"));
    }
    let valid = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    if !valid {
        return Err(format!(
            "{name:?} must consist of lower case alphanumeric characters, '-' or '.'"
        ));
    }
    Ok(())
}

/// Schema of the `metadata` block of a namespaced object of `kind`.
#[must_use]
pub fn namespaced_metadata_schema(kind: &str) -> AttributeSchema {
    let block = ResourceSchema::new()
        .attribute(
            "annotations",
            AttributeSchema::string_map()
                .with_description(format!("An unstructured key value map stored with the {kind}")),
        )
        .attribute(
            "generation",
            AttributeSchema::int().computed().with_description(
                "A sequence number representing a specific generation of the desired state",
            ),
        )
        .attribute(
            "labels",
            AttributeSchema::string_map()
                .with_description(format!("Map of string keys and values used to organize the {kind}")),
        )
        .attribute(
            "name",
            AttributeSchema::string()
                .optional_computed()
                .force_new()
                .with_validation(validate_name)
                .with_description(format!("Name of the {kind}, must be unique")),
        )
        .attribute(
            "generate_name",
            AttributeSchema::string()
                .optional()
                .force_new()
                .with_validation(validate_name)
                .with_description("Prefix used by the server to generate a unique name"),
        )
        .attribute(
            "namespace",
            AttributeSchema::string()
                .optional()
                .force_new()
                .with_default("default")
                .with_description(format!("Namespace defines the space within which the name of the {kind} must be unique")),
        )
        .attribute("resource_version", AttributeSchema::string().computed())
        .attribute("self_link", AttributeSchema::string().computed())
        .attribute("uid", AttributeSchema::string().computed());

    AttributeSchema::list(Element::block(block))
        .required()
        .with_items(1, Some(1))
        .with_description(format!("Standard {kind}'s metadata"))
}

/// Builds object metadata from the first element of the `metadata` block.
#[must_use]
pub fn expand_metadata(block: &Value) -> ObjectMeta {
    let field = |name: &str| {
        block
            .lookup(&[name])
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let map = |name: &str| block.lookup(&[name]).map(Value::string_map).unwrap_or_default();

    let mut namespace = field("namespace");
    if namespace.is_empty() {
        namespace = "default".to_string();
    }
    ObjectMeta {
        name: field("name"),
        generate_name: field("generate_name"),
        namespace,
        labels: map("labels"),
        annotations: map("annotations"),
        ..ObjectMeta::default()
    }
}

/// Renders object metadata as a one-element `metadata` block.
#[must_use]
pub fn flatten_metadata(meta: &ObjectMeta) -> Value {
    let mut block: BTreeMap<String, Value> = BTreeMap::new();
    block.insert("name".to_string(), meta.name.as_str().into());
    block.insert("namespace".to_string(), meta.namespace.as_str().into());
    block.insert("labels".to_string(), meta.labels.clone().into());
    block.insert("annotations".to_string(), meta.annotations.clone().into());
    block.insert("generation".to_string(), meta.generation.into());
    block.insert("resource_version".to_string(), meta.resource_version.as_str().into());
    block.insert("self_link".to_string(), meta.self_link.as_str().into());
    block.insert("uid".to_string(), meta.uid.as_str().into());
    if !meta.generate_name.is_empty() {
        block.insert("generate_name".to_string(), meta.generate_name.as_str().into());
    }
    Value::List(vec![Value::Map(block)])
}

/// Patches annotations and labels that changed under `key_prefix`
/// (`metadata.0.`), addressed below `path_prefix` (`/metadata/`).
#[must_use]
pub fn patch_metadata(key_prefix: &str, path_prefix: &str, data: &ResourceData) -> PatchOperations {
    let mut ops = PatchOperations::new();
    for field in ["annotations", "labels"] {
        let key = format!("{key_prefix}{field}");
        if data.has_change(&key) {
            let (old, new) = data.change(&key);
            ops.extend(diff_string_map(
                &format!("{path_prefix}{field}"),
                &old.string_map(),
                &new.string_map(),
            ));
        }
    }
    ops
}

/// Builds the `namespace/name` resource ID.
#[must_use]
pub fn build_id(meta: &ObjectMeta) -> String {
    format!("{}/{}", meta.namespace, meta.name)
}

/// Splits a `namespace/name` resource ID.
///
/// # Errors
///
/// Returns [`LifecycleError::InvalidImportId`] when the ID has another shape.
pub fn id_parts(id: &str) -> Result<(String, String)> {
    match id.split_once('/') {
        Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((namespace.to_string(), name.to_string()))
        }
        _ => Err(LifecycleError::InvalidImportId {
            id: id.to_string(),
            expected: "namespace/name".to_string(),
        }
        .into()),
    }
}
