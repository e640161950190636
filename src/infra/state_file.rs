//! JSON file store for the product state document.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::{MonitorError, ProductStates, StateStore};

/// Keeps the whole document in one pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    /// Store backed by the file at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> Result<ProductStates, MonitorError> {
        if !self.path.exists() {
            let states = ProductStates::default();
            self.save(&states)?;
            tracing::info!(path = %self.path.display(), "created empty product states");
            return Ok(states);
        }

        let raw = fs::read_to_string(&self.path)
            .map_err(|e| MonitorError::Storage(format!("{}: {e}", self.path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| MonitorError::Storage(format!("{}: {e}", self.path.display())))
    }

    fn save(&self, states: &ProductStates) -> Result<(), MonitorError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| MonitorError::Storage(e.to_string()))?;
            }
        }
        let json = serde_json::to_string_pretty(states)
            .map_err(|e| MonitorError::Storage(e.to_string()))?;

        // Write beside the target and rename so readers never see half a file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|e| MonitorError::Storage(format!("{}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| MonitorError::Storage(format!("{}: {e}", self.path.display())))
    }
}
