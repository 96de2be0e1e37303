//! Dynamically typed attribute values.

use std::collections::BTreeMap;
use std::fmt;

/// An attribute bag: top-level attribute name to value.
pub type Attributes = BTreeMap<String, Value>;

/// A single attribute value.
///
/// Sets are stored keyed by the element's hash code so that two sets with
/// the same logical members compare equal regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    /// No value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// String.
    String(String),
    /// Ordered sequence.
    List(Vec<Value>),
    /// Unordered set keyed by element hash code.
    Set(BTreeMap<String, Value>),
    /// Nested bag, used for map attributes and block elements.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the type name used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
        }
    }

    /// Returns true for null and for the zero value of every type.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !b,
            Self::Int(i) => *i == 0,
            Self::String(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Set(items) | Self::Map(items) => items.is_empty(),
        }
    }

    /// Returns the string content, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer content, if this is an integer.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the boolean content, if this is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the elements of a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the entries of a map or block element.
    #[must_use]
    pub const fn as_map(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Returns the members of a set, or the elements of a list, in stable order.
    #[must_use]
    pub fn elements(&self) -> Vec<&Self> {
        match self {
            Self::List(items) => items.iter().collect(),
            Self::Set(items) => items.values().collect(),
            _ => Vec::new(),
        }
    }

    /// Returns every string element of a list or set.
    #[must_use]
    pub fn string_elements(&self) -> Vec<String> {
        self.elements()
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }

    /// Returns a map of string entries.
    #[must_use]
    pub fn string_map(&self) -> BTreeMap<String, String> {
        self.as_map()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Looks up a nested value by path segments.
    ///
    /// Lists are indexed numerically, sets by hash code, maps by key.
    #[must_use]
    pub fn lookup(&self, path: &[&str]) -> Option<&Self> {
        let Some((head, rest)) = path.split_first() else {
            return Some(self);
        };
        let next = match self {
            Self::List(items) => head.parse::<usize>().ok().and_then(|i| items.get(i)),
            Self::Set(items) | Self::Map(items) => items.get(*head),
            _ => None,
        }?;
        next.lookup(rest)
    }

    /// Canonical text form used for hashing.
    ///
    /// Zero-valued map entries are skipped so an absent field and its zero
    /// value produce the same form.
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::String(s) => s.clone(),
            Self::List(items) => {
                let parts: Vec<String> = items.iter().map(Self::canonical).collect();
                format!("[{}]", parts.join(","))
            }
            Self::Set(items) => {
                let codes: Vec<&str> = items.keys().map(String::as_str).collect();
                format!("{{{}}}", codes.join(","))
            }
            Self::Map(entries) => entries
                .iter()
                .filter(|(_, v)| !v.is_zero())
                .map(|(k, v)| format!("{k}={};", v.canonical()))
                .collect(),
        }
    }

    /// Converts to JSON for display.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => items.iter().map(Self::to_json).collect(),
            Self::Set(items) => items.values().map(Self::to_json).collect(),
            Self::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "<null>"),
            Self::String(s) => write!(f, "{s:?}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Self::String(s.clone())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Vec<Self>> for Value {
    fn from(items: Vec<Self>) -> Self {
        Self::List(items)
    }
}

impl From<BTreeMap<String, String>> for Value {
    fn from(entries: BTreeMap<String, String>) -> Self {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k, Self::String(v)))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, Self>> for Value {
    fn from(entries: BTreeMap<String, Self>) -> Self {
        Self::Map(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_nested_paths() {
        let mut port = BTreeMap::new();
        port.insert("name".to_string(), Value::from("http"));
        port.insert("port".to_string(), Value::from(80));
        let value = Value::List(vec![Value::Map(port)]);

        assert_eq!(value.lookup(&["0", "port"]), Some(&Value::Int(80)));
        assert_eq!(value.lookup(&["1", "port"]), None);
        assert_eq!(value.lookup(&["zero"]), None);
    }

    #[test]
    fn test_canonical_ignores_zero_fields() {
        let mut sparse = BTreeMap::new();
        sparse.insert("port".to_string(), Value::from(80));
        let mut full = sparse.clone();
        full.insert("name".to_string(), Value::from(""));
        full.insert("node_port".to_string(), Value::from(0));

        assert_eq!(Value::Map(sparse).canonical(), Value::Map(full).canonical());
    }

    #[test]
    fn test_zero_values() {
        assert!(Value::Null.is_zero());
        assert!(Value::from("").is_zero());
        assert!(Value::from(0).is_zero());
        assert!(!Value::from("x").is_zero());
        assert!(Value::List(Vec::new()).is_zero());
    }
}
