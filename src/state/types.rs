//! Persisted state of a single resource instance.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Current version of the state format.
pub const STATE_VERSION: &str = "1";

/// The committed state of one resource instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    /// State format version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Registered resource type name.
    pub resource_type: String,
    /// Resource ID assigned by the handler.
    pub id: String,
    /// Flattened attributes.
    pub attributes: BTreeMap<String, String>,
    /// When the state was last written.
    pub updated_at: DateTime<Utc>,
}

fn default_version() -> String {
    STATE_VERSION.to_string()
}

impl InstanceState {
    /// Creates a state record stamped with the current time.
    #[must_use]
    pub fn new(resource_type: &str, id: &str, attributes: BTreeMap<String, String>) -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            resource_type: resource_type.to_string(),
            id: id.to_string(),
            attributes,
            updated_at: Utc::now(),
        }
    }

    /// Returns the flat attribute value at `key`.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Hex SHA-256 over the ID and attributes, ignoring timestamps.
    ///
    /// Two reads of an unchanged resource produce the same digest.
    #[must_use]
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.resource_type.as_bytes());
        hasher.update([0]);
        hasher.update(self.id.as_bytes());
        for (key, value) in &self.attributes {
            hasher.update([0]);
            hasher.update(key.as_bytes());
            hasher.update([1]);
            hasher.update(value.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_digest_ignores_timestamp() {
        let a = InstanceState::new("google_compute_address", "addr", attrs(&[("name", "addr")]));
        let mut b = a.clone();
        b.updated_at = a.updated_at + chrono::Duration::seconds(30);
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
    }

    #[test]
    fn test_digest_tracks_attributes() {
        let a = InstanceState::new("google_compute_address", "addr", attrs(&[("name", "addr")]));
        let b = InstanceState::new("google_compute_address", "addr", attrs(&[("name", "other")]));
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_serde_round_trip() {
        let state = InstanceState::new("kubernetes_service", "default/web", attrs(&[("spec.#", "1")]));
        let json = serde_json::to_string(&state).expect("serialize");
        let back: InstanceState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.digest(), state.digest());
        assert_eq!(back.attribute("spec.#"), Some("1"));
    }
}
