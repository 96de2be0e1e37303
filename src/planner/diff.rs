//! Diff of one resource's desired configuration against its prior state.
//!
//! The diff walks the schema rather than the values, so diff suppression,
//! set hashing and attribute modes decide what counts as a change.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::schema::{AttributeKind, AttributeMode, AttributeSchema, Attributes, Element, ResourceSchema, Value};

/// What applying a plan will do to the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    /// The resource does not exist yet.
    Create,
    /// In-place update of mutable attributes.
    Update,
    /// A force-new attribute changed: delete, then create.
    Replace,
    /// Nothing to do.
    NoOp,
    /// The resource is no longer configured.
    Delete,
}

/// One attribute that differs between prior state and configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeChange {
    /// Dotted attribute path, e.g. `metadata.0.namespace`.
    pub path: String,
    /// Prior value.
    pub old: Value,
    /// Desired value.
    pub new: Value,
    /// The change cannot be applied in place.
    pub forces_new: bool,
}

/// The planned action for one resource with the changes that caused it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourcePlan {
    /// Resource type name.
    pub resource_type: String,
    /// ID of the existing resource, if any.
    pub id: Option<String>,
    /// Planned action.
    pub action: PlanAction,
    /// Attribute changes, sorted by path.
    pub changes: Vec<AttributeChange>,
}

impl ResourcePlan {
    /// Returns true if applying the plan does nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.action == PlanAction::NoOp
    }

    /// Returns the paths of the changes that force replacement.
    #[must_use]
    pub fn replace_reasons(&self) -> Vec<&str> {
        self.changes
            .iter()
            .filter(|c| c.forces_new)
            .map(|c| c.path.as_str())
            .collect()
    }
}

/// Computes the attribute changes from `prior` to `config`.
///
/// Computed-only attributes never change, and an optional+computed
/// attribute absent from configuration keeps whatever the provider
/// computed. Single-block lists are compared field by field so a nested
/// force-new field forces replacement.
#[must_use]
pub fn diff(schema: &ResourceSchema, prior: &Attributes, config: &Attributes) -> Vec<AttributeChange> {
    let mut changes = Vec::new();
    diff_block(schema, "", prior, config, false, &mut changes);
    changes.sort_by(|a, b| a.path.cmp(&b.path));
    changes
}

fn diff_block(
    schema: &ResourceSchema,
    prefix: &str,
    prior: &BTreeMap<String, Value>,
    config: &BTreeMap<String, Value>,
    parent_forces_new: bool,
    out: &mut Vec<AttributeChange>,
) {
    for (name, attr) in schema.attributes() {
        if attr.mode == AttributeMode::Computed {
            continue;
        }
        let new = config.get(name).filter(|v| !matches!(v, Value::Null));
        if attr.mode == AttributeMode::OptionalComputed && new.is_none() {
            continue;
        }
        let old = prior.get(name).filter(|v| !matches!(v, Value::Null));
        let path = format!("{prefix}{name}");
        let forces_new = parent_forces_new || attr.force_new;

        if let Some(block) = single_block(attr) {
            let empty = BTreeMap::new();
            let old_block = first_map(old).unwrap_or(&empty);
            let new_block = first_map(new).unwrap_or(&empty);
            if old.is_some() && new.is_some() {
                diff_block(block, &format!("{path}.0."), old_block, new_block, forces_new, out);
                continue;
            }
        }

        if !attr.equivalent(&path, old, new) {
            debug!("Attribute {path} changed (forces new: {forces_new})");
            out.push(AttributeChange {
                old: old.cloned().unwrap_or_else(|| attr.zero_value()),
                new: new.cloned().unwrap_or_else(|| attr.zero_value()),
                path,
                forces_new,
            });
        }
    }
}

/// Returns the block schema of a list holding at most one block.
fn single_block(attr: &AttributeSchema) -> Option<&ResourceSchema> {
    if attr.kind != AttributeKind::List || attr.max_items != Some(1) {
        return None;
    }
    match attr.elem.as_deref() {
        Some(Element::Block(block)) => Some(block),
        _ => None,
    }
}

fn first_map(value: Option<&Value>) -> Option<&BTreeMap<String, Value>> {
    value
        .and_then(Value::as_list)
        .and_then(|items| items.first())
        .and_then(Value::as_map)
}

/// Classifies a set of changes into a plan.
///
/// `prior` is `None` for a resource that does not exist; `config` is
/// `None` for a resource that is no longer wanted.
#[must_use]
pub fn plan_resource(
    resource_type: &str,
    schema: &ResourceSchema,
    prior: Option<(&str, &Attributes)>,
    config: Option<&Attributes>,
) -> ResourcePlan {
    let empty = Attributes::new();
    let id = prior.map(|(id, _)| id.to_string());
    let (action, changes) = match (prior, config) {
        (None, None) => (PlanAction::NoOp, Vec::new()),
        (Some(_), None) => (PlanAction::Delete, Vec::new()),
        (None, Some(config)) => (PlanAction::Create, diff(schema, &empty, config)),
        (Some((_, prior)), Some(config)) => {
            let changes = diff(schema, prior, config);
            let action = if changes.is_empty() {
                PlanAction::NoOp
            } else if changes.iter().any(|c| c.forces_new) {
                PlanAction::Replace
            } else {
                PlanAction::Update
            };
            (action, changes)
        }
    };
    debug!("Planned {action} of {resource_type} with {} changes", changes.len());
    ResourcePlan {
        resource_type: resource_type.to_string(),
        id,
        action,
        changes,
    }
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::NoOp => "no change",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for ResourcePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.resource_type, self.action)?;
        if !self.changes.is_empty() {
            write!(f, " (")?;
            for (i, change) in self.changes.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", change.path)?;
                if change.forces_new {
                    write!(f, " forces replacement")?;
                }
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}
