//! Resolution of caller-supplied log names to files in the log directory.

use std::path::{Path, PathBuf};

use super::LogCatalog;
use crate::error::{ControlError, ControlResult};

/// Resolves requested log names against the catalog and the confined
/// log directory.
#[derive(Debug, Clone)]
pub struct PathResolver {
    log_dir: PathBuf,
    catalog: LogCatalog,
}

impl PathResolver {
    pub fn new(log_dir: impl Into<PathBuf>, catalog: LogCatalog) -> Self {
        Self {
            log_dir: log_dir.into(),
            catalog,
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn catalog(&self) -> &LogCatalog {
        &self.catalog
    }

    /// Resolve a free-form log name to the canonical path of its file.
    ///
    /// Any directory component in `requested` is discarded before lookup.
    /// The result is a direct child of the canonical log directory whose
    /// name is on the allow-list. Every failure is reported as
    /// [`ControlError::InvalidLogIdentifier`].
    pub fn resolve(&self, requested: &str) -> ControlResult<PathBuf> {
        let base = Path::new(requested)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| reject(requested, "no file name"))?;

        let source = self
            .catalog
            .find(base)
            .ok_or_else(|| reject(requested, "not catalogued"))?;

        let root = self
            .log_dir
            .canonicalize()
            .map_err(|_| reject(requested, "log directory missing"))?;

        let resolved = self
            .log_dir
            .join(&source.file)
            .canonicalize()
            .map_err(|_| reject(requested, "file missing"))?;

        if resolved.parent() != Some(root.as_path()) {
            return Err(reject(requested, "outside log directory"));
        }

        let resolved_name = resolved
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if !self.catalog.allows_file(resolved_name) {
            return Err(reject(requested, "resolved name not allowed"));
        }

        if !resolved.is_file() {
            return Err(reject(requested, "not a regular file"));
        }

        Ok(resolved)
    }
}

fn reject(requested: &str, reason: &str) -> ControlError {
    tracing::debug!(requested = %requested, reason, "Rejected log request");
    ControlError::InvalidLogIdentifier
}
