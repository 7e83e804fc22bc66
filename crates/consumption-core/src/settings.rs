//! Control-surface settings: where the plugin keeps its files and which
//! external services it talks to.
//!
//! These are the settings of the control surface itself, not the plugin
//! configuration edited by operators (see [`crate::config`]).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Plugin data directory on a LoxBerry installation
pub const DEFAULT_DATA_DIR: &str = "/opt/loxberry/data/plugins/consumption_prediction";

/// Plugin script directory on a LoxBerry installation
pub const DEFAULT_BIN_DIR: &str = "/opt/loxberry/bin/plugins/consumption_prediction";

/// Environment variable that rebases every data path
pub const DATA_DIR_ENV: &str = "CONSUMPTION_DATA_DIR";

/// Per-user settings file, read when no explicit file is given.
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("consumption-ctl").join("control.json"))
}

/// An HTTP health endpoint of a dependent service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthEndpoint {
    pub name: String,
    pub url: String,
}

impl HealthEndpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Paths and collaborators used by the control surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// Confined directory holding every viewable log
    pub log_dir: PathBuf,

    /// Persisted plugin configuration (JSON)
    pub settings_file: PathBuf,

    /// Database file whose presence is reported by the status check
    pub database_file: PathBuf,

    /// Directory holding the job scripts
    pub bin_dir: PathBuf,

    /// Interpreter used to run job scripts
    pub interpreter: PathBuf,

    /// Service-composition manifest handed to `docker compose -f`
    pub manifest_file: PathBuf,

    /// Container-manager executable
    pub compose_program: PathBuf,

    /// Service restarted after configuration changes
    pub dependent_service: String,

    /// Upper bound for a single restart command
    pub restart_timeout_secs: u64,

    /// Upper bound for a single health probe
    pub probe_timeout_secs: u64,

    /// Health endpoints reported by the status check
    pub health_endpoints: Vec<HealthEndpoint>,

    /// HTTP bind address for the server
    pub bind: String,
}

impl Default for ControlSettings {
    fn default() -> Self {
        let mut settings = Self {
            log_dir: PathBuf::new(),
            settings_file: PathBuf::new(),
            database_file: PathBuf::new(),
            bin_dir: PathBuf::from(DEFAULT_BIN_DIR),
            interpreter: PathBuf::from("/usr/bin/python3"),
            manifest_file: PathBuf::new(),
            compose_program: PathBuf::from("docker"),
            dependent_service: "mqtt_daemon".to_string(),
            restart_timeout_secs: 60,
            probe_timeout_secs: 2,
            health_endpoints: vec![
                HealthEndpoint::new("influxdb", "http://localhost:8086/health"),
                HealthEndpoint::new("grafana", "http://localhost:3000/api/health"),
            ],
            bind: "127.0.0.1:8787".to_string(),
        };
        settings.rebase(DEFAULT_DATA_DIR);
        settings
    }
}

impl ControlSettings {
    /// Defaults, overlaid by a settings file, then by the environment.
    ///
    /// An explicit `config` must exist. Without one, the per-user file from
    /// [`default_config_file`] is read when present.
    pub fn load(config: Option<&Path>) -> std::io::Result<Self> {
        let settings = match config {
            Some(path) => Self::from_file(path)?,
            None => match default_config_file() {
                Some(path) if path.is_file() => Self::from_file(path)?,
                _ => Self::default(),
            },
        };
        Ok(settings.with_env())
    }

    /// Load settings from a JSON file; missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Apply the data-directory environment override, if set.
    pub fn with_env(mut self) -> Self {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.is_empty() {
                self.rebase(dir);
            }
        }
        self
    }

    /// Move every data path under `data_dir`, keeping file names.
    pub fn with_data_dir(mut self, data_dir: impl AsRef<Path>) -> Self {
        self.rebase(data_dir);
        self
    }

    fn rebase(&mut self, data_dir: impl AsRef<Path>) {
        let data_dir = data_dir.as_ref();
        self.log_dir = data_dir.to_path_buf();
        self.settings_file = data_dir.join("settings.json");
        self.database_file = data_dir.join("energy_data.sqlite");
        self.manifest_file = data_dir.join("docker-compose.yml");
    }

    pub fn restart_timeout(&self) -> Duration {
        Duration::from_secs(self.restart_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
