//! RFC 6902 JSON Patch documents.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value as Json;

/// One JSON Patch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    /// Adds a member or appends to an array.
    Add {
        /// JSON Pointer.
        path: String,
        /// Value to add.
        value: Json,
    },
    /// Replaces an existing member.
    Replace {
        /// JSON Pointer.
        path: String,
        /// New value.
        value: Json,
    },
    /// Removes a member.
    Remove {
        /// JSON Pointer.
        path: String,
    },
}

/// An ordered patch document.
pub type PatchOperations = Vec<PatchOperation>;

/// Escapes one JSON Pointer reference token.
#[must_use]
pub fn escape_json_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Diffs two string maps into operations below `path_prefix`.
///
/// Keys are touched individually so entries managed by someone else stay
/// intact. When the old map is empty the whole new map is added at once,
/// since the parent member may not exist yet.
#[must_use]
pub fn diff_string_map(
    path_prefix: &str,
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> PatchOperations {
    let prefix = path_prefix.trim_end_matches('/');
    if old.is_empty() {
        if new.is_empty() {
            return Vec::new();
        }
        return vec![PatchOperation::Add {
            path: prefix.to_string(),
            value: serde_json::to_value(new).unwrap_or_default(),
        }];
    }

    let mut ops = Vec::new();
    for key in old.keys().filter(|k| !new.contains_key(*k)) {
        ops.push(PatchOperation::Remove {
            path: format!("{prefix}/{}", escape_json_pointer(key)),
        });
    }
    for (key, value) in new {
        let path = format!("{prefix}/{}", escape_json_pointer(key));
        match old.get(key) {
            Some(current) if current == value => {}
            Some(_) => ops.push(PatchOperation::Replace {
                path,
                value: Json::String(value.clone()),
            }),
            None => ops.push(PatchOperation::Add {
                path,
                value: Json::String(value.clone()),
            }),
        }
    }
    ops
}
