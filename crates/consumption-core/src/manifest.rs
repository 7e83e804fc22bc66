//! Raw-text access to the service-composition manifest.

use std::path::{Path, PathBuf};

use crate::config::write_atomic;
use crate::error::{ControlError, ControlResult};

/// Owner of the manifest file. Content is never parsed or merged.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> ControlResult<String> {
        std::fs::read_to_string(&self.path).map_err(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "Manifest could not be read");
            ControlError::ManifestUnavailable(e.to_string())
        })
    }

    /// Replace the whole manifest with `contents`.
    pub fn replace(&self, contents: &str) -> ControlResult<()> {
        write_atomic(&self.path, contents.as_bytes()).map_err(|e| {
            tracing::error!(path = %self.path.display(), error = %e, "Manifest write failed");
            ControlError::ManifestUnavailable(e.to_string())
        })?;
        tracing::info!(path = %self.path.display(), bytes = contents.len(), "Manifest replaced");
        Ok(())
    }
}
