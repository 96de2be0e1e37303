//! Attribute and resource schemas.
//!
//! A [`ResourceSchema`] declares every attribute a resource exposes, with
//! its type, mode, force-new flag, default, validation predicate,
//! diff-suppression predicate and set hash function. The same schema drives
//! manifest decoding, configuration validation, planning and the persisted
//! flat layout.

use std::collections::BTreeMap;

use crate::error::SchemaError;

use super::hash;
use super::value::{Attributes, Value};

/// Validation predicate. Returns a message when the value is rejected.
pub type ValidateFn = fn(&Value) -> std::result::Result<(), String>;

/// Diff suppression predicate: `(key, old, new)` returns true when the two
/// strings denote the same logical value.
pub type DiffSuppressFn = fn(&str, &str, &str) -> bool;

/// Set element hash function.
pub type SetHashFn = fn(&Value) -> u32;

/// Semantic type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// String scalar.
    String,
    /// Integer scalar.
    Int,
    /// Boolean scalar.
    Bool,
    /// Ordered sequence.
    List,
    /// Unordered set with hashed elements.
    Set,
    /// String-keyed map.
    Map,
}

impl AttributeKind {
    /// Returns the name used in messages and CLI output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Bool => "bool",
            Self::List => "list",
            Self::Set => "set",
            Self::Map => "map",
        }
    }
}

/// Who supplies an attribute's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeMode {
    /// Must be set in configuration.
    Required,
    /// May be set in configuration.
    Optional,
    /// Only set by the provider.
    Computed,
    /// May be set in configuration; otherwise the provider fills it in.
    OptionalComputed,
}

impl AttributeMode {
    /// Returns true when the provider may fill in the value.
    #[must_use]
    pub const fn is_computed(self) -> bool {
        matches!(self, Self::Computed | Self::OptionalComputed)
    }

    /// Returns true when configuration may set the value.
    #[must_use]
    pub const fn is_configurable(self) -> bool {
        !matches!(self, Self::Computed)
    }

    /// Returns the name used in CLI output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Optional => "optional",
            Self::Computed => "computed",
            Self::OptionalComputed => "optional+computed",
        }
    }
}

/// Element type of a list, set or map attribute.
#[derive(Debug, Clone)]
pub enum Element {
    /// Scalar elements described by an attribute schema.
    Scalar(AttributeSchema),
    /// Nested block elements.
    Block(ResourceSchema),
}

/// A node reached by walking a dotted attribute path.
#[derive(Debug, Clone, Copy)]
pub enum SchemaNode<'a> {
    /// A named attribute.
    Attribute(&'a AttributeSchema),
    /// An element of a list, set or map.
    Element(&'a Element),
}

/// Metadata for a single attribute.
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    /// Semantic type.
    pub kind: AttributeKind,
    /// Required, optional or computed.
    pub mode: AttributeMode,
    /// Any change forces replacement.
    pub force_new: bool,
    /// Value used when configuration omits the attribute.
    pub default: Option<Value>,
    /// Human readable description.
    pub description: String,
    /// Element type for collections.
    pub elem: Option<Box<Element>>,
    /// Hash function for set elements.
    pub set_hash: Option<SetHashFn>,
    /// Validation predicate.
    pub validate: Option<ValidateFn>,
    /// Diff suppression predicate for strings.
    pub diff_suppress: Option<DiffSuppressFn>,
    /// Minimum number of collection elements.
    pub min_items: usize,
    /// Maximum number of collection elements.
    pub max_items: Option<usize>,
}

impl AttributeSchema {
    fn new(kind: AttributeKind) -> Self {
        Self {
            kind,
            mode: AttributeMode::Optional,
            force_new: false,
            default: None,
            description: String::new(),
            elem: None,
            set_hash: None,
            validate: None,
            diff_suppress: None,
            min_items: 0,
            max_items: None,
        }
    }

    /// A string attribute.
    #[must_use]
    pub fn string() -> Self {
        Self::new(AttributeKind::String)
    }

    /// An integer attribute.
    #[must_use]
    pub fn int() -> Self {
        Self::new(AttributeKind::Int)
    }

    /// A boolean attribute.
    #[must_use]
    pub fn bool() -> Self {
        Self::new(AttributeKind::Bool)
    }

    /// An ordered list attribute.
    #[must_use]
    pub fn list(elem: Element) -> Self {
        let mut attr = Self::new(AttributeKind::List);
        attr.elem = Some(Box::new(elem));
        attr
    }

    /// A set attribute hashed by content.
    #[must_use]
    pub fn set(elem: Element) -> Self {
        let mut attr = Self::new(AttributeKind::Set);
        attr.set_hash = Some(match elem {
            Element::Scalar(_) => hash::hash_string,
            Element::Block(_) => hash::hash_block,
        });
        attr.elem = Some(Box::new(elem));
        attr
    }

    /// A map of strings.
    #[must_use]
    pub fn string_map() -> Self {
        let mut attr = Self::new(AttributeKind::Map);
        attr.elem = Some(Box::new(Element::Scalar(Self::string())));
        attr
    }

    /// Marks the attribute required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.mode = AttributeMode::Required;
        self
    }

    /// Marks the attribute optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.mode = AttributeMode::Optional;
        self
    }

    /// Marks the attribute computed-only.
    #[must_use]
    pub fn computed(mut self) -> Self {
        self.mode = AttributeMode::Computed;
        self
    }

    /// Marks the attribute optional and computed.
    #[must_use]
    pub fn optional_computed(mut self) -> Self {
        self.mode = AttributeMode::OptionalComputed;
        self
    }

    /// Any change to this attribute forces replacement.
    #[must_use]
    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the validation predicate.
    #[must_use]
    pub fn with_validation(mut self, validate: ValidateFn) -> Self {
        self.validate = Some(validate);
        self
    }

    /// Sets the diff suppression predicate.
    #[must_use]
    pub fn with_diff_suppress(mut self, suppress: DiffSuppressFn) -> Self {
        self.diff_suppress = Some(suppress);
        self
    }

    /// Overrides the set element hash function.
    #[must_use]
    pub fn with_set_hash(mut self, set_hash: SetHashFn) -> Self {
        self.set_hash = Some(set_hash);
        self
    }

    /// Bounds the number of collection elements.
    #[must_use]
    pub fn with_items(mut self, min: usize, max: Option<usize>) -> Self {
        self.min_items = min;
        self.max_items = max;
        self
    }

    /// Returns the zero value of this attribute's type.
    #[must_use]
    pub fn zero_value(&self) -> Value {
        match self.kind {
            AttributeKind::String => Value::String(String::new()),
            AttributeKind::Int => Value::Int(0),
            AttributeKind::Bool => Value::Bool(false),
            AttributeKind::List => Value::List(Vec::new()),
            AttributeKind::Set => Value::Set(BTreeMap::new()),
            AttributeKind::Map => Value::Map(BTreeMap::new()),
        }
    }

    /// Walks the remaining path segments below this attribute.
    #[must_use]
    pub fn lookup(&self, rest: &[&str]) -> Option<SchemaNode<'_>> {
        let Some((_, below)) = rest.split_first() else {
            return Some(SchemaNode::Attribute(self));
        };
        let elem = self.elem.as_deref()?;
        match self.kind {
            AttributeKind::List | AttributeKind::Set | AttributeKind::Map => elem.lookup(below),
            _ => None,
        }
    }

    /// Converts a value to this attribute's shape, hashing set elements.
    ///
    /// Lists are accepted where sets are declared. When `defaults` is true,
    /// block defaults are filled in before elements are hashed.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not match the declared type.
    pub fn normalize(&self, key: &str, value: Value, defaults: bool) -> Result<Value, SchemaError> {
        if matches!(value, Value::Null) {
            return Ok(Value::Null);
        }
        match (self.kind, value) {
            (AttributeKind::String, v @ Value::String(_))
            | (AttributeKind::Int, v @ Value::Int(_))
            | (AttributeKind::Bool, v @ Value::Bool(_)) => Ok(v),
            (AttributeKind::List, Value::List(items)) => {
                let elem = self.element(key)?;
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    out.push(elem.normalize(&format!("{key}.{i}"), item, defaults)?);
                }
                Ok(Value::List(out))
            }
            (AttributeKind::Set, Value::List(items)) => {
                let elem = self.element(key)?;
                let set_hash = self.set_hash.unwrap_or(hash::hash_block);
                let mut out = BTreeMap::new();
                for item in items {
                    let item = elem.normalize(key, item, defaults)?;
                    out.insert(set_hash(&item).to_string(), item);
                }
                Ok(Value::Set(out))
            }
            (AttributeKind::Set, Value::Set(items)) => {
                self.normalize(key, Value::List(items.into_values().collect()), defaults)
            }
            (AttributeKind::Map, Value::Map(entries)) => {
                let elem = self.element(key)?;
                let mut out = BTreeMap::new();
                for (k, v) in entries {
                    let v = elem.normalize(&format!("{key}.{k}"), v, defaults)?;
                    out.insert(k, v);
                }
                Ok(Value::Map(out))
            }
            (kind, other) => Err(SchemaError::mismatch(key, kind.name(), other.type_name())),
        }
    }

    fn element(&self, key: &str) -> Result<&Element, SchemaError> {
        self.elem.as_deref().ok_or_else(|| SchemaError::InvalidSchema {
            resource: String::new(),
            key: key.to_string(),
            message: "collection attribute has no element type".to_string(),
        })
    }

    /// Returns true when `old` and `new` denote the same logical value.
    ///
    /// Missing values compare as the zero value. String attributes honour
    /// the diff suppression predicate; lists compare element-wise.
    #[must_use]
    pub fn equivalent(&self, key: &str, old: Option<&Value>, new: Option<&Value>) -> bool {
        let zero = self.zero_value();
        let old = present(old).unwrap_or(&zero);
        let new = present(new).unwrap_or(&zero);

        match (old, new) {
            (Value::String(a), Value::String(b)) => {
                a == b || self.diff_suppress.is_some_and(|suppress| suppress(key, a, b))
            }
            (Value::Set(a), Value::Set(b)) => a.keys().eq(b.keys()),
            (Value::List(a), Value::List(b)) => {
                let Some(elem) = self.elem.as_deref() else {
                    return a == b;
                };
                a.len() == b.len()
                    && a.iter().zip(b).enumerate().all(|(i, (x, y))| {
                        elem.equivalent(&format!("{key}.{i}"), Some(x), Some(y))
                    })
            }
            _ => old == new,
        }
    }

    fn validate_value(&self, key: &str, value: &Value) -> Result<(), SchemaError> {
        if matches!(value, Value::Null) {
            return Ok(());
        }
        if let Some(validate) = self.validate {
            validate(value).map_err(|message| SchemaError::invalid(key, message))?;
        }
        match value {
            Value::List(_) | Value::Set(_) => {
                let items = value.elements();
                if items.len() < self.min_items {
                    return Err(SchemaError::invalid(
                        key,
                        format!("attribute supports {} item minimum, config has {}", self.min_items, items.len()),
                    ));
                }
                if let Some(max) = self.max_items.filter(|max| items.len() > *max) {
                    return Err(SchemaError::invalid(
                        key,
                        format!("attribute supports {max} item maximum, config has {}", items.len()),
                    ));
                }
                if let Some(elem) = self.elem.as_deref() {
                    let codes: Vec<String> = match value {
                        Value::Set(entries) => entries.keys().cloned().collect(),
                        _ => (0..items.len()).map(|i| i.to_string()).collect(),
                    };
                    for (code, item) in codes.iter().zip(items) {
                        elem.validate_value(&format!("{key}.{code}"), item)?;
                    }
                }
                Ok(())
            }
            Value::Map(entries) => {
                if let Some(elem) = self.elem.as_deref() {
                    for (k, v) in entries {
                        elem.validate_value(&format!("{key}.{k}"), v)?;
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !matches!(v, Value::Null))
}

impl Element {
    /// Builds a scalar string element.
    #[must_use]
    pub fn string() -> Self {
        Self::Scalar(AttributeSchema::string())
    }

    /// Builds a block element.
    #[must_use]
    pub const fn block(schema: ResourceSchema) -> Self {
        Self::Block(schema)
    }

    fn lookup(&self, rest: &[&str]) -> Option<SchemaNode<'_>> {
        if rest.is_empty() {
            return Some(SchemaNode::Element(self));
        }
        match self {
            Self::Block(schema) => schema.lookup(rest),
            Self::Scalar(_) => None,
        }
    }

    /// Returns the zero value of one element.
    #[must_use]
    pub fn zero_value(&self) -> Value {
        match self {
            Self::Scalar(attr) => attr.zero_value(),
            Self::Block(_) => Value::Map(BTreeMap::new()),
        }
    }

    fn normalize(&self, key: &str, value: Value, defaults: bool) -> Result<Value, SchemaError> {
        match self {
            Self::Scalar(attr) => attr.normalize(key, value, defaults),
            Self::Block(schema) => match value {
                Value::Map(entries) => Ok(Value::Map(schema.normalize_block(
                    &format!("{key}."),
                    entries,
                    defaults,
                )?)),
                other => Err(SchemaError::mismatch(key, "block", other.type_name())),
            },
        }
    }

    /// Returns true when two elements denote the same logical value.
    #[must_use]
    pub fn equivalent(&self, key: &str, old: Option<&Value>, new: Option<&Value>) -> bool {
        match self {
            Self::Scalar(attr) => attr.equivalent(key, old, new),
            Self::Block(schema) => {
                let empty = BTreeMap::new();
                let old = present(old).and_then(Value::as_map).unwrap_or(&empty);
                let new = present(new).and_then(Value::as_map).unwrap_or(&empty);
                schema.attributes().all(|(name, attr)| {
                    if attr.mode == AttributeMode::Computed {
                        return true;
                    }
                    if attr.mode == AttributeMode::OptionalComputed && present(new.get(name)).is_none() {
                        return true;
                    }
                    attr.equivalent(&format!("{key}.{name}"), old.get(name), new.get(name))
                })
            }
        }
    }

    fn validate_value(&self, key: &str, value: &Value) -> Result<(), SchemaError> {
        match (self, value) {
            (Self::Scalar(attr), v) => attr.validate_value(key, v),
            (Self::Block(schema), Value::Map(entries)) => {
                schema.validate_block(&format!("{key}."), entries)
            }
            (Self::Block(_), other) => Err(SchemaError::mismatch(key, "block", other.type_name())),
        }
    }
}

/// The full attribute schema of a resource, also used for nested blocks.
#[derive(Debug, Clone, Default)]
pub struct ResourceSchema {
    attributes: BTreeMap<String, AttributeSchema>,
}

impl ResourceSchema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute.
    #[must_use]
    pub fn attribute(mut self, name: &str, attr: AttributeSchema) -> Self {
        self.attributes.insert(name.to_string(), attr);
        self
    }

    /// Returns the named attribute.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.get(name)
    }

    /// Returns true if the attribute is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Iterates over attributes in name order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeSchema)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Walks a dotted path split into segments.
    #[must_use]
    pub fn lookup(&self, path: &[&str]) -> Option<SchemaNode<'_>> {
        let (head, rest) = path.split_first()?;
        self.attributes.get(*head)?.lookup(rest)
    }

    /// Returns the zero value at a dotted path, or null when undeclared.
    #[must_use]
    pub fn zero_at(&self, path: &[&str]) -> Value {
        match self.lookup(path) {
            Some(SchemaNode::Attribute(attr)) => attr.zero_value(),
            Some(SchemaNode::Element(elem)) => elem.zero_value(),
            None => Value::Null,
        }
    }

    /// Decodes a JSON manifest into an attribute bag, applying defaults and
    /// hashing set elements.
    ///
    /// # Errors
    ///
    /// Returns an error on unknown attributes or type mismatches.
    pub fn decode(&self, manifest: &serde_json::Value) -> Result<Attributes, SchemaError> {
        let serde_json::Value::Object(entries) = manifest else {
            return Err(SchemaError::mismatch("<root>", "object", json_type(manifest)));
        };
        let mut raw = BTreeMap::new();
        for (k, v) in entries {
            raw.insert(k.clone(), from_json(k, v)?);
        }
        self.normalize_block("", raw, true)
    }

    /// Normalizes an attribute bag written by code rather than decoded.
    ///
    /// # Errors
    ///
    /// Returns an error on unknown attributes or type mismatches.
    pub fn normalize(&self, attributes: Attributes, defaults: bool) -> Result<Attributes, SchemaError> {
        self.normalize_block("", attributes, defaults)
    }

    fn normalize_block(
        &self,
        prefix: &str,
        entries: BTreeMap<String, Value>,
        defaults: bool,
    ) -> Result<BTreeMap<String, Value>, SchemaError> {
        let mut out = BTreeMap::new();
        for (name, value) in entries {
            let key = format!("{prefix}{name}");
            let attr = self
                .attributes
                .get(&name)
                .ok_or_else(|| SchemaError::UnknownAttribute { key: key.clone() })?;
            let value = attr.normalize(&key, value, defaults)?;
            if !matches!(value, Value::Null) {
                out.insert(name, value);
            }
        }
        if defaults {
            for (name, attr) in &self.attributes {
                if let Some(default) = &attr.default {
                    out.entry(name.clone()).or_insert_with(|| default.clone());
                }
            }
        }
        Ok(out)
    }

    /// Validates a configuration bag: required attributes present, no
    /// computed-only attributes set, predicates and item bounds satisfied.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn validate_config(&self, attributes: &Attributes) -> Result<(), SchemaError> {
        self.validate_block("", attributes)
    }

    fn validate_block(&self, prefix: &str, entries: &BTreeMap<String, Value>) -> Result<(), SchemaError> {
        for (name, value) in entries {
            let key = format!("{prefix}{name}");
            let attr = self
                .attributes
                .get(name)
                .ok_or_else(|| SchemaError::UnknownAttribute { key: key.clone() })?;
            if attr.mode == AttributeMode::Computed && !matches!(value, Value::Null) {
                return Err(SchemaError::ComputedSet { key });
            }
            attr.validate_value(&key, value)?;
        }
        for (name, attr) in &self.attributes {
            if attr.mode == AttributeMode::Required && present(entries.get(name)).is_none() {
                return Err(SchemaError::MissingRequired {
                    key: format!("{prefix}{name}"),
                });
            }
        }
        Ok(())
    }

    /// Checks the schema's own consistency.
    ///
    /// When the resource has no update operation every configurable
    /// top-level attribute must force replacement.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn internal_validate(&self, resource: &str, has_update: bool) -> Result<(), SchemaError> {
        self.internal_validate_block(resource, "", Some(has_update))
    }

    fn internal_validate_block(
        &self,
        resource: &str,
        prefix: &str,
        top_level_update: Option<bool>,
    ) -> Result<(), SchemaError> {
        for (name, attr) in &self.attributes {
            let key = format!("{prefix}{name}");
            let fail = |message: &str| SchemaError::InvalidSchema {
                resource: resource.to_string(),
                key: key.clone(),
                message: message.to_string(),
            };

            if attr.mode == AttributeMode::Required && attr.default.is_some() {
                return Err(fail("required attributes cannot have a default"));
            }
            if attr.mode == AttributeMode::Computed {
                if attr.default.is_some() {
                    return Err(fail("computed attributes cannot have a default"));
                }
                if attr.force_new {
                    return Err(fail("computed attributes cannot be force-new"));
                }
                if attr.validate.is_some() {
                    return Err(fail("computed attributes cannot be validated"));
                }
            }
            if top_level_update == Some(false) && attr.mode.is_configurable() && !attr.force_new {
                return Err(fail("all configurable fields must be force-new when update is not supported"));
            }
            match attr.kind {
                AttributeKind::List | AttributeKind::Set | AttributeKind::Map => {
                    let Some(elem) = attr.elem.as_deref() else {
                        return Err(fail("collection attribute has no element type"));
                    };
                    if attr.kind == AttributeKind::Set && attr.set_hash.is_none() {
                        return Err(fail("set attribute has no hash function"));
                    }
                    if let Element::Block(block) = elem {
                        block.internal_validate_block(resource, &format!("{key}."), None)?;
                    }
                }
                _ => {
                    if attr.elem.is_some() {
                        return Err(fail("scalar attribute cannot have an element type"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Converts untyped JSON into a value. Objects become maps and arrays
/// become lists; schema normalization refines them afterwards.
///
/// # Errors
///
/// Returns an error for non-integer numbers.
pub fn from_json(key: &str, json: &serde_json::Value) -> Result<Value, SchemaError> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Int(
            n.as_i64()
                .ok_or_else(|| SchemaError::mismatch(key, "int", "float"))?,
        ),
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::List(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| from_json(&format!("{key}.{i}"), v))
                .collect::<Result<_, _>>()?,
        ),
        serde_json::Value::Object(entries) => Value::Map(
            entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), from_json(&format!("{key}.{k}"), v)?)))
                .collect::<Result<_, SchemaError>>()?,
        ),
    })
}

const fn json_type(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
