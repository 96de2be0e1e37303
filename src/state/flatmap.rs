//! Flat key/value layout of persisted resource attributes.
//!
//! Lists are written as `key.#` plus `key.<index>`, sets as `key.#` plus
//! `key.<hash>`, maps as `key.%` plus `key.<name>`, and block elements add
//! a trailing `.<field>`.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::SchemaError;
use crate::schema::{AttributeKind, AttributeSchema, Attributes, Element, ResourceSchema, Value};

/// Flattens an attribute bag into its persisted layout.
#[must_use]
pub fn flatten(schema: &ResourceSchema, attributes: &Attributes) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    flatten_block(schema, "", attributes, &mut out);
    out
}

fn flatten_block(
    schema: &ResourceSchema,
    prefix: &str,
    entries: &BTreeMap<String, Value>,
    out: &mut BTreeMap<String, String>,
) {
    for (name, value) in entries {
        let key = format!("{prefix}{name}");
        match schema.get(name) {
            Some(attr) => flatten_attribute(attr, &key, value, out),
            None => flatten_untyped(&key, value, out),
        }
    }
}

fn flatten_attribute(attr: &AttributeSchema, key: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Null => {}
        Value::Bool(_) | Value::Int(_) | Value::String(_) => {
            out.insert(key.to_string(), value.canonical());
        }
        Value::List(items) => {
            out.insert(format!("{key}.#"), items.len().to_string());
            for (i, item) in items.iter().enumerate() {
                flatten_element(attr.elem.as_deref(), &format!("{key}.{i}"), item, out);
            }
        }
        Value::Set(items) => {
            out.insert(format!("{key}.#"), items.len().to_string());
            for (code, item) in items {
                flatten_element(attr.elem.as_deref(), &format!("{key}.{code}"), item, out);
            }
        }
        Value::Map(entries) => {
            out.insert(format!("{key}.%"), entries.len().to_string());
            for (name, item) in entries {
                flatten_untyped(&format!("{key}.{name}"), item, out);
            }
        }
    }
}

fn flatten_element(elem: Option<&Element>, key: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match (elem, value) {
        (Some(Element::Block(block)), Value::Map(entries)) => {
            flatten_block(block, &format!("{key}."), entries, out);
        }
        (Some(Element::Scalar(attr)), v) => flatten_attribute(attr, key, v, out),
        (_, v) => flatten_untyped(key, v, out),
    }
}

fn flatten_untyped(key: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Null => {}
        Value::List(_) | Value::Set(_) | Value::Map(_) => {
            out.insert(key.to_string(), value.to_json().to_string());
        }
        scalar => {
            out.insert(key.to_string(), scalar.canonical());
        }
    }
}

/// Rebuilds an attribute bag from its persisted layout.
///
/// # Errors
///
/// Returns an error when a scalar cannot be parsed as its declared type.
pub fn expand(schema: &ResourceSchema, flat: &BTreeMap<String, String>) -> Result<Attributes, SchemaError> {
    expand_block(schema, "", flat)
}

fn expand_block(
    schema: &ResourceSchema,
    prefix: &str,
    flat: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, Value>, SchemaError> {
    let mut out = BTreeMap::new();
    for (name, attr) in schema.attributes() {
        let key = format!("{prefix}{name}");
        if let Some(value) = expand_attribute(attr, &key, flat)? {
            out.insert(name.to_string(), value);
        }
    }
    Ok(out)
}

fn expand_attribute(
    attr: &AttributeSchema,
    key: &str,
    flat: &BTreeMap<String, String>,
) -> Result<Option<Value>, SchemaError> {
    match attr.kind {
        AttributeKind::String | AttributeKind::Int | AttributeKind::Bool => flat
            .get(key)
            .map(|raw| parse_scalar(attr.kind, key, raw))
            .transpose(),
        AttributeKind::List => {
            let Some(count) = count_at(flat, &format!("{key}.#"))? else {
                return Ok(None);
            };
            let mut items = Vec::with_capacity(count);
            for i in 0..count {
                items.push(expand_element(attr.elem.as_deref(), &format!("{key}.{i}"), flat)?);
            }
            Ok(Some(Value::List(items)))
        }
        AttributeKind::Set => {
            if count_at(flat, &format!("{key}.#"))?.is_none() {
                return Ok(None);
            }
            let mut items = BTreeMap::new();
            for code in child_segments(flat, key, "#") {
                let item = expand_element(attr.elem.as_deref(), &format!("{key}.{code}"), flat)?;
                items.insert(code, item);
            }
            Ok(Some(Value::Set(items)))
        }
        AttributeKind::Map => {
            if count_at(flat, &format!("{key}.%"))?.is_none() {
                return Ok(None);
            }
            let lead = format!("{key}.");
            let entries = flat
                .range(lead.clone()..)
                .take_while(|(k, _)| k.starts_with(&lead))
                .filter_map(|(k, v)| {
                    let name = &k[lead.len()..];
                    (name != "%").then(|| (name.to_string(), Value::String(v.clone())))
                })
                .collect();
            Ok(Some(Value::Map(entries)))
        }
    }
}

fn expand_element(elem: Option<&Element>, key: &str, flat: &BTreeMap<String, String>) -> Result<Value, SchemaError> {
    match elem {
        Some(Element::Block(block)) => Ok(Value::Map(expand_block(block, &format!("{key}."), flat)?)),
        Some(Element::Scalar(attr)) => Ok(expand_attribute(attr, key, flat)?.unwrap_or(Value::Null)),
        None => Ok(flat.get(key).map_or(Value::Null, |raw| Value::String(raw.clone()))),
    }
}

fn parse_scalar(kind: AttributeKind, key: &str, raw: &str) -> Result<Value, SchemaError> {
    let corrupted = |message: String| SchemaError::CorruptedState {
        key: key.to_string(),
        message,
    };
    match kind {
        AttributeKind::Int => raw
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| corrupted(format!("invalid integer {raw:?}: {e}"))),
        AttributeKind::Bool => match raw {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            other => Err(corrupted(format!("invalid boolean {other:?}"))),
        },
        _ => Ok(Value::String(raw.to_string())),
    }
}

fn count_at(flat: &BTreeMap<String, String>, key: &str) -> Result<Option<usize>, SchemaError> {
    flat.get(key)
        .map(|raw| {
            raw.parse::<usize>().map_err(|e| SchemaError::CorruptedState {
                key: key.to_string(),
                message: format!("invalid count {raw:?}: {e}"),
            })
        })
        .transpose()
}

fn child_segments(flat: &BTreeMap<String, String>, key: &str, skip: &str) -> BTreeSet<String> {
    let lead = format!("{key}.");
    flat.range(lead.clone()..)
        .take_while(|(k, _)| k.starts_with(&lead))
        .filter_map(|(k, _)| k[lead.len()..].split('.').next().map(str::to_string))
        .filter(|segment| segment != skip)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ResourceSchema {
        let port = ResourceSchema::new()
            .attribute("name", AttributeSchema::string().optional())
            .attribute("port", AttributeSchema::int().required());
        let metadata = ResourceSchema::new()
            .attribute("name", AttributeSchema::string().required())
            .attribute("labels", AttributeSchema::string_map());
        ResourceSchema::new()
            .attribute("name", AttributeSchema::string().required())
            .attribute("size", AttributeSchema::int().optional())
            .attribute("enabled", AttributeSchema::bool().optional())
            .attribute("metadata", AttributeSchema::list(Element::block(metadata)))
            .attribute("ports", AttributeSchema::set(Element::block(port)))
            .attribute("pools", AttributeSchema::set(Element::string()))
    }

    #[test]
    fn test_flatten_layout() {
        let schema = schema();
        let attrs = schema
            .decode(&json!({
                "name": "web",
                "size": 3,
                "enabled": true,
                "metadata": [{"name": "web", "labels": {"app.kubernetes.io/name": "web"}}],
                "pools": ["a"],
            }))
            .expect("decode should succeed");
        let flat = flatten(&schema, &attrs);

        assert_eq!(flat.get("name").map(String::as_str), Some("web"));
        assert_eq!(flat.get("size").map(String::as_str), Some("3"));
        assert_eq!(flat.get("enabled").map(String::as_str), Some("true"));
        assert_eq!(flat.get("metadata.#").map(String::as_str), Some("1"));
        assert_eq!(flat.get("metadata.0.name").map(String::as_str), Some("web"));
        assert_eq!(flat.get("metadata.0.labels.%").map(String::as_str), Some("1"));
        assert_eq!(
            flat.get("metadata.0.labels.app.kubernetes.io/name").map(String::as_str),
            Some("web")
        );
        let code = crate::schema::hash::hash_string(&Value::from("a"));
        assert_eq!(flat.get(&format!("pools.{code}")).map(String::as_str), Some("a"));
    }

    #[test]
    fn test_expand_restores_bag() {
        let schema = schema();
        let attrs = schema
            .decode(&json!({
                "name": "web",
                "size": 3,
                "metadata": [{"name": "web", "labels": {"tier": "frontend"}}],
                "ports": [{"name": "http", "port": 80}, {"port": 443}],
                "pools": ["a", "b"],
            }))
            .expect("decode should succeed");
        let flat = flatten(&schema, &attrs);
        let restored = expand(&schema, &flat).expect("expand should succeed");

        assert_eq!(restored, attrs);
    }

    #[test]
    fn test_expand_rejects_bad_integer() {
        let schema = schema();
        let mut flat = BTreeMap::new();
        flat.insert("size".to_string(), "three".to_string());
        assert!(matches!(
            expand(&schema, &flat),
            Err(SchemaError::CorruptedState { .. })
        ));
    }
}
