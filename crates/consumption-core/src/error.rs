//! Error types for the control subsystem

use thiserror::Error;

/// Main error type for control operations
#[derive(Error, Debug)]
pub enum ControlError {
    /// Requested log is unknown, missing, or resolves outside the log directory.
    ///
    /// Carries no detail: traversal attempts and unknown names
    /// look the same to the caller.
    #[error("Invalid log file")]
    InvalidLogIdentifier,

    /// Validated log could not be opened or read
    #[error("Log unavailable: {0}")]
    LogUnavailable(String),

    /// Persisted configuration exists but cannot be parsed
    #[error("Configuration corrupt: {0}")]
    ConfigCorrupt(String),

    /// Configuration could not be written
    #[error("Configuration write failed: {0}")]
    ConfigWrite(String),

    /// Dependent service restart did not complete successfully
    #[error("Service restart failed for {service}: {reason}")]
    ServiceRestartFailed { service: String, reason: String },

    /// Job name is not in the job table
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    /// Job process could not be spawned
    #[error("Failed to launch job {job}: {reason}")]
    JobLaunchFailed { job: String, reason: String },

    /// Service-composition manifest could not be read or written
    #[error("Manifest unavailable: {0}")]
    ManifestUnavailable(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControlError {
    /// Whether this error was caused by a bad request rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ControlError::InvalidLogIdentifier | ControlError::UnknownJob(_)
        )
    }
}

/// Result type alias using ControlError
pub type ControlResult<T> = Result<T, ControlError>;
