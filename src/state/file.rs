//! Single-instance JSON state file.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{Result, StateError};

use super::types::InstanceState;

/// A JSON file holding the state of one resource instance.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    /// Creates a handle for the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the state, or `None` when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(&self) -> Result<Option<InstanceState>> {
        if !self.path.exists() {
            debug!("State file does not exist: {}", self.path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).await?;
        let state: InstanceState =
            serde_json::from_str(&content).map_err(|e| StateError::Corrupted {
                path: self.path.clone(),
                message: format!("Failed to parse state file: {e}"),
            })?;

        debug!("Loaded state for {} {}", state.resource_type, state.id);
        Ok(Some(state))
    }

    /// Writes the state atomically, or removes the file for `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, state: Option<&InstanceState>) -> Result<()> {
        let Some(state) = state else {
            if self.path.exists() {
                info!("Resource is gone, removing state file: {}", self.path.display());
                fs::remove_file(&self.path).await?;
            }
            return Ok(());
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(state).map_err(|e| StateError::Serialization {
            message: format!("Failed to serialize state: {e}"),
        })?;

        // Write to a temporary file first, then rename for atomicity
        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &self.path).await?;

        info!("Saved state for {} {} to {}", state.resource_type, state.id, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let file = StateFile::new(temp.path().join("nested").join("address.json"));

        let mut attributes = BTreeMap::new();
        attributes.insert("name".to_string(), "addr".to_string());
        let state = InstanceState::new("google_compute_address", "addr", attributes);
        file.save(Some(&state)).await.expect("Failed to save state");

        let loaded = file
            .load()
            .await
            .expect("Failed to load state")
            .expect("State should exist");
        assert_eq!(loaded.id, "addr");
        assert_eq!(loaded.digest(), state.digest());
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let file = StateFile::new(temp.path().join("missing.json"));
        assert!(file.load().await.expect("Load should not fail").is_none());
    }

    #[tokio::test]
    async fn test_save_none_removes_file() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let file = StateFile::new(temp.path().join("svc.json"));
        let state = InstanceState::new("kubernetes_service", "default/web", BTreeMap::new());
        file.save(Some(&state)).await.expect("Failed to save state");
        assert!(file.path().exists());

        file.save(None).await.expect("Failed to remove state");
        assert!(!file.path().exists());
    }

    #[tokio::test]
    async fn test_corrupted_file() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let path = temp.path().join("bad.json");
        std::fs::write(&path, "{not json").expect("write fixture");
        let err = StateFile::new(path).load().await.expect_err("parse should fail");
        assert!(err.to_string().contains("corrupted"));
    }
}
