//! Resource schemas and the attribute accessor.
//!
//! This module provides:
//! - [`Value`]: dynamically typed attribute values
//! - [`ResourceSchema`] / [`AttributeSchema`]: per-attribute metadata
//! - [`ResourceData`]: the accessor handlers read and write through
//! - [`hash`]: set hashing and self-link comparison helpers

mod attribute;
mod data;
pub mod hash;
mod value;

pub use attribute::{
    AttributeKind, AttributeMode, AttributeSchema, DiffSuppressFn, Element, ResourceSchema,
    SchemaNode, SetHashFn, ValidateFn, from_json,
};
pub use data::ResourceData;
pub use value::{Attributes, Value};
