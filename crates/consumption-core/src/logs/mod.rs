//! Log access for the plugin's append-only log files.
//!
//! Every job and daemon of the plugin appends plain text lines to its own
//! file in one directory. Lines may carry a `[warning]` or `[error]` marker
//! anywhere in the text:
//!
//! ```text
//! /opt/loxberry/data/plugins/consumption_prediction/
//! ├── mqtt_daemon.log      # [2026-01-21 14:30:45] Connected to broker
//! ├── train_model.log      # [2026-01-21 14:31:02] [warning] Not enough data
//! ├── prediction.log
//! ├── eval.log
//! ├── loxone_publish.log
//! └── control.log          # written by this crate's MarkerLayer
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use consumption_core::logs::{LogCatalog, LogReader, PathResolver};
//!
//! let data_dir = "/opt/loxberry/data/plugins/consumption_prediction";
//! let resolver = PathResolver::new(data_dir, LogCatalog::plugin());
//! let path = resolver.resolve("train_model")?;
//! let view = LogReader::default().read("train_model", &path)?;
//! for entry in &view.entries {
//!     println!("{:>7} {}", entry.severity, entry.text);
//! }
//! ```

pub mod entry;
pub mod layer;
pub mod reader;
pub mod resolver;
pub mod writer;

pub use entry::{LogEntry, LogView, Severity};
pub use layer::MarkerLayer;
pub use reader::{LogReader, MAX_ENTRIES};
pub use resolver::PathResolver;
pub use writer::LogFileWriter;

use serde::Serialize;

/// Identifier of the log shown when a caller names none.
pub const DEFAULT_LOG: &str = "mqtt_daemon";

/// Identifier of the control server's own log.
pub const CONTROL_LOG: &str = "control";

/// One viewable log: its symbolic identifier, file name and display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogSource {
    pub id: String,
    pub file: String,
    pub label: String,
}

impl LogSource {
    pub fn new(id: impl Into<String>, file: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            file: file.into(),
            label: label.into(),
        }
    }
}

/// The closed allow-list of viewable logs, fixed at startup.
#[derive(Debug, Clone)]
pub struct LogCatalog {
    sources: Vec<LogSource>,
}

impl LogCatalog {
    pub fn new(sources: Vec<LogSource>) -> Self {
        Self { sources }
    }

    /// Logs written by the plugin's daemons, jobs, and this control server.
    pub fn plugin() -> Self {
        Self::new(vec![
            LogSource::new("mqtt_daemon", "mqtt_daemon.log", "MQTT Listener"),
            LogSource::new("prediction", "prediction.log", "Prediction"),
            LogSource::new("train_model", "train_model.log", "Model Training"),
            LogSource::new("eval", "eval.log", "Model Evaluation"),
            LogSource::new("send_predictions", "loxone_publish.log", "Prediction Sending"),
            LogSource::new(CONTROL_LOG, "control.log", "Control Server"),
        ])
    }

    pub fn sources(&self) -> &[LogSource] {
        &self.sources
    }

    /// Look up a source by identifier or by file name.
    pub fn find(&self, name: &str) -> Option<&LogSource> {
        self.sources
            .iter()
            .find(|s| s.id == name || s.file == name)
    }

    /// Whether `file_name` is the file of some catalog entry.
    pub fn allows_file(&self, file_name: &str) -> bool {
        self.sources.iter().any(|s| s.file == file_name)
    }

    /// File name of the control server's own log, if catalogued.
    pub fn control_file(&self) -> Option<&str> {
        self.find(CONTROL_LOG).map(|s| s.file.as_str())
    }
}

impl Default for LogCatalog {
    fn default() -> Self {
        Self::plugin()
    }
}
