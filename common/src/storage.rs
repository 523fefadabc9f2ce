// Raw key-value persistence primitive for the channel registry
//
// A single JSON object file mapping group identifiers to destination
// identifiers, created empty on first use.

use crate::errors::StorageError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Refuse to start without the configured data directory. Creating it
/// silently would hide a misconfigured deployment, so absence is fatal.
pub fn validate_data_dir(path: &Path) -> Result<(), StorageError> {
    if !path.is_dir() {
        return Err(StorageError::MissingDataDir(path.display().to_string()));
    }
    Ok(())
}

/// Whole-file JSON store holding one string-to-string mapping.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    /// Open the store, creating an empty file if none exists yet.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, StorageError> {
        let path = path.into();
        if !path.exists() {
            fs::write(&path, b"{}").map_err(|e| StorageError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
            info!(path = %path.display(), "Created registry store file");
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the full persisted mapping.
    pub fn load_map(&self) -> Result<HashMap<String, String>, StorageError> {
        let contents = fs::read_to_string(&self.path).map_err(|e| StorageError::Io {
            path: self.path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&contents).map_err(|e| StorageError::MalformedContent {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Write the full mapping back, replacing the previous contents.
    pub fn persist_map(&self, map: &HashMap<String, String>) -> Result<(), StorageError> {
        let contents = serde_json::to_vec(map).map_err(|e| StorageError::MalformedContent {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        fs::write(&self.path, contents).map_err(|e| StorageError::Io {
            path: self.path.display().to_string(),
            source: e,
        })
    }
}
