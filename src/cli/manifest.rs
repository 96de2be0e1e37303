//! Resource manifests.
//!
//! A manifest names one resource type and its desired attributes:
//!
//! ```yaml
//! type: google_compute_address
//! attributes:
//!   name: ip-a
//!   region: us-central1
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{ConfigError, Result};

/// One resource's desired configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResourceManifest {
    /// Resource type name.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Desired attributes, as a JSON object.
    #[serde(default = "empty_object")]
    pub attributes: serde_json::Value,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl ResourceManifest {
    /// Parses a manifest from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse(content: &str, source: Option<&Path>) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            ConfigError::ParseError {
                message: format!("Invalid manifest: {e}"),
                location: source.map(|p| p.display().to_string()),
            }
            .into()
        })
    }

    /// Loads a manifest file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading manifest from: {}", path.display());
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, Some(path))
    }
}
