//! The state accessor handed to lifecycle handlers.
//!
//! [`ResourceData`] layers three attribute bags: the prior committed state,
//! the desired configuration (present during create and update), and the
//! values written by the handler. Reads resolve written values first, then
//! configuration, then prior state. Partial mode restricts which fields are
//! committed when a handler fails midway.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::SchemaError;
use crate::state::{InstanceState, flatmap};

use super::attribute::{AttributeMode, ResourceSchema, SchemaNode};
use super::value::{Attributes, Value};

/// Typed access to one resource instance's attributes.
#[derive(Debug, Clone)]
pub struct ResourceData {
    resource_type: String,
    schema: Arc<ResourceSchema>,
    id: String,
    prior: Attributes,
    config: Option<Attributes>,
    written: Attributes,
    partial: bool,
    partial_keys: BTreeSet<String>,
}

impl ResourceData {
    /// Creates an accessor from optional prior state and optional desired
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the prior state does not match the schema.
    pub fn new(
        resource_type: &str,
        schema: Arc<ResourceSchema>,
        prior: Option<&InstanceState>,
        config: Option<Attributes>,
    ) -> Result<Self, SchemaError> {
        let (id, prior) = match prior {
            Some(state) => (
                state.id.clone(),
                flatmap::expand(&schema, &state.attributes)?,
            ),
            None => (String::new(), Attributes::new()),
        };
        Ok(Self {
            resource_type: resource_type.to_string(),
            schema,
            id,
            prior,
            config,
            written: Attributes::new(),
            partial: false,
            partial_keys: BTreeSet::new(),
        })
    }

    /// Creates an accessor for a new resource from its configuration.
    #[must_use]
    pub fn from_config(resource_type: &str, schema: Arc<ResourceSchema>, config: Attributes) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            schema,
            id: String::new(),
            prior: Attributes::new(),
            config: Some(config),
            written: Attributes::new(),
            partial: false,
            partial_keys: BTreeSet::new(),
        }
    }

    /// Creates an accessor that knows only an ID, as used by import.
    #[must_use]
    pub fn for_import(resource_type: &str, schema: Arc<ResourceSchema>, id: &str) -> Self {
        let mut data = Self::from_config(resource_type, schema, Attributes::new());
        data.config = None;
        data.id = id.to_string();
        data
    }

    /// Returns the resource type name.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    /// Returns the resource ID; empty when the resource does not exist.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sets the resource ID. An empty ID marks the resource as removed.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    fn current_top(&self, name: &str) -> Option<&Value> {
        if let Some(value) = self.written.get(name) {
            return Some(value);
        }
        match &self.config {
            Some(config) => match config.get(name) {
                Some(value) => Some(value),
                None if self.is_computed(name) => self.prior.get(name),
                None => None,
            },
            None => self.prior.get(name),
        }
    }

    fn is_computed(&self, name: &str) -> bool {
        self.schema
            .get(name)
            .is_some_and(|attr| attr.mode.is_computed())
    }

    fn resolve<'a>(source: Option<&'a Value>, rest: &[&str]) -> Option<&'a Value> {
        source.and_then(|v| v.lookup(rest))
    }

    /// Returns the current value at a dotted path, or its zero value.
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        let path: Vec<&str> = key.split('.').collect();
        let Some((top, rest)) = path.split_first() else {
            return Value::Null;
        };
        Self::resolve(self.current_top(top), rest)
            .filter(|v| !matches!(v, Value::Null))
            .cloned()
            .unwrap_or_else(|| self.schema.zero_at(&path))
    }

    /// Returns the value at `key` when it is set to a non-zero value.
    #[must_use]
    pub fn get_ok(&self, key: &str) -> Option<Value> {
        let value = self.get(key);
        (!value.is_zero()).then_some(value)
    }

    /// Returns the string at `key`, or an empty string.
    #[must_use]
    pub fn get_string(&self, key: &str) -> String {
        self.get(key).as_str().unwrap_or_default().to_string()
    }

    /// Returns the integer at `key`, or zero.
    #[must_use]
    pub fn get_int(&self, key: &str) -> i64 {
        self.get(key).as_int().unwrap_or_default()
    }

    /// Returns the boolean at `key`, or false.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).as_bool().unwrap_or_default()
    }

    /// Returns the committed value at `key` before this invocation.
    #[must_use]
    pub fn get_prior(&self, key: &str) -> Value {
        let path: Vec<&str> = key.split('.').collect();
        let Some((top, rest)) = path.split_first() else {
            return Value::Null;
        };
        Self::resolve(self.prior.get(*top), rest)
            .cloned()
            .unwrap_or_else(|| self.schema.zero_at(&path))
    }

    /// Returns `(old, new)` for `key`.
    #[must_use]
    pub fn change(&self, key: &str) -> (Value, Value) {
        (self.get_prior(key), self.get(key))
    }

    /// Returns true when the desired value at `key` differs from the prior
    /// state, honouring diff suppression and set hashing.
    #[must_use]
    pub fn has_change(&self, key: &str) -> bool {
        let path: Vec<&str> = key.split('.').collect();
        let Some((top, rest)) = path.split_first() else {
            return false;
        };
        let old = Self::resolve(self.prior.get(*top), rest);
        let new = Self::resolve(self.current_top(top), rest);
        match self.schema.lookup(&path) {
            Some(SchemaNode::Attribute(attr)) => !attr.equivalent(key, old, new),
            Some(SchemaNode::Element(elem)) => !elem.equivalent(key, old, new),
            None => old != new,
        }
    }

    /// Writes a top-level attribute. Lists are hashed into sets where the
    /// schema declares a set.
    ///
    /// # Errors
    ///
    /// Returns an error for undeclared attributes or mismatched types.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<(), SchemaError> {
        let attr = self
            .schema
            .get(key)
            .ok_or_else(|| SchemaError::UnknownAttribute {
                key: key.to_string(),
            })?;
        let value = attr.normalize(key, value.into(), false)?;
        self.written.insert(key.to_string(), value);
        Ok(())
    }

    /// Enables or disables partial mode.
    ///
    /// While enabled, only fields marked with [`ResourceData::set_partial`]
    /// are committed over the prior state.
    pub fn partial(&mut self, enabled: bool) {
        self.partial = enabled;
        if !enabled {
            self.partial_keys.clear();
        }
    }

    /// Marks a top-level attribute as safe to commit.
    pub fn set_partial(&mut self, key: &str) {
        if self.partial {
            self.partial_keys.insert(key.to_string());
        }
    }

    /// Returns true while partial mode is enabled.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        self.partial
    }

    /// Returns the attribute bag that would be committed now.
    #[must_use]
    pub fn committed_attributes(&self) -> Attributes {
        let mut attrs = self.prior.clone();
        let keys: Vec<String> = if self.partial {
            self.partial_keys.iter().cloned().collect()
        } else {
            self.schema.attributes().map(|(k, _)| k.to_string()).collect()
        };
        for key in keys {
            match self.current_top(&key) {
                Some(value) if !matches!(value, Value::Null) => {
                    attrs.insert(key, value.clone());
                }
                _ => {
                    let keeps_prior = self
                        .schema
                        .get(&key)
                        .is_some_and(|attr| attr.mode == AttributeMode::Computed);
                    if !keeps_prior {
                        attrs.remove(&key);
                    }
                }
            }
        }
        attrs
    }

    /// Returns the state to persist, or `None` when the ID is empty.
    #[must_use]
    pub fn state(&self) -> Option<InstanceState> {
        if self.id.is_empty() {
            return None;
        }
        let attributes = flatmap::flatten(&self.schema, &self.committed_attributes());
        Some(InstanceState::new(&self.resource_type, &self.id, attributes))
    }
}
