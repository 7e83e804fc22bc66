//! Consumption Prediction Control Core
//!
//! Log access, configuration and job/service control for the consumption
//! prediction plugin.
//!
//! ## Overview
//!
//! The plugin runs a set of Python daemons and batch jobs next to InfluxDB,
//! Grafana and an MQTT broker. This crate is the operator-facing side of it:
//! it shows the plugin's logs, edits its settings, restarts the daemons that
//! read them and kicks off training or prediction runs.
//!
//! ## Core Principles
//!
//! - **Confined**: only catalogued log files inside one directory are readable
//! - **Fire-and-forget**: jobs are spawned and never awaited on the request path
//! - **Atomic**: configuration and manifest writes never leave a partial file
//!
//! ## Quick Start
//!
//! ```ignore
//! use consumption_core::{ControlApi, ControlSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = ControlApi::from_settings(&ControlSettings::default().with_env());
//!
//!     for entry in api.log_view(Some("train_model")).await?.entries {
//!         println!("{:>7} {}", entry.severity, entry.text);
//!     }
//!
//!     let ack = api.trigger_job("predict")?;
//!     println!("{}", ack.message);
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod jobs;
pub mod logs;
pub mod manifest;
pub mod service;
pub mod settings;
pub mod status;

// Re-exports
pub use api::{Applied, ControlApi};
pub use config::{ConfigStore, Configuration, SaveOutcome, SettingValue};
pub use error::{ControlError, ControlResult};
pub use jobs::{JobAck, JobLauncher, JobObserver, JobSpec, JobTable, LogObserver};
pub use logs::{
    LogCatalog, LogEntry, LogReader, LogSource, LogView, MarkerLayer, PathResolver, Severity,
    DEFAULT_LOG, MAX_ENTRIES,
};
pub use manifest::ManifestStore;
pub use service::{ComposeController, ServiceController};
pub use settings::{ControlSettings, HealthEndpoint, DATA_DIR_ENV};
pub use status::{ServiceHealth, StatusProbe, StatusReport};
