//! Plugin configuration: defaults overlaid by the persisted JSON document.
//!
//! The document is a flat JSON object shared with the plugin's daemons:
//!
//! ```json
//! {
//!   "mqtt_broker": "localhost",
//!   "mqtt_port": 1883,
//!   "mqtt_topic_prediction": "home/energy/predictions"
//! }
//! ```
//!
//! Every save rewrites the whole document through a temporary file and a
//! rename, so readers see either the old or the new document, never a mix.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{ControlError, ControlResult};

/// A single setting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl SettingValue {
    /// Convert `self` to the type of `default` when the conversion is lossless.
    ///
    /// Form posts and the CLI deliver every value as text; a port typed
    /// `"1884"` should persist as the integer `1884`.
    pub fn coerce_like(self, default: &SettingValue) -> SettingValue {
        match (default, self) {
            (SettingValue::Integer(_), SettingValue::Text(s)) => match s.trim().parse::<i64>() {
                Ok(n) => SettingValue::Integer(n),
                Err(_) => SettingValue::Text(s),
            },
            (SettingValue::Float(_), SettingValue::Text(s)) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => SettingValue::Float(n),
                _ => SettingValue::Text(s),
            },
            (SettingValue::Float(_), SettingValue::Integer(n)) => SettingValue::Float(n as f64),
            (SettingValue::Text(_), SettingValue::Integer(n)) => SettingValue::Text(n.to_string()),
            (SettingValue::Text(_), SettingValue::Float(n)) => SettingValue::Text(n.to_string()),
            (_, value) => value,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SettingValue::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Integer(n) => write!(f, "{}", n),
            SettingValue::Float(n) => write!(f, "{}", n),
            SettingValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        SettingValue::Text(s.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(s: String) -> Self {
        SettingValue::Text(s)
    }
}

impl From<i64> for SettingValue {
    fn from(n: i64) -> Self {
        SettingValue::Integer(n)
    }
}

impl From<f64> for SettingValue {
    fn from(n: f64) -> Self {
        SettingValue::Float(n)
    }
}

/// A flat key/value configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(BTreeMap<String, SettingValue>);

impl Configuration {
    /// Default plugin configuration; its keys are the accepted schema.
    pub fn plugin_defaults() -> Self {
        let mut values = BTreeMap::new();
        let mut set = |k: &str, v: SettingValue| {
            values.insert(k.to_string(), v);
        };
        set("mqtt_broker", "localhost".into());
        set("mqtt_port", SettingValue::Integer(1883));
        set("mqtt_username", "loxberry".into());
        set("mqtt_password", "loxberry".into());
        set("mqtt_topic_prediction", "home/energy/predictions".into());
        set("mqtt_topic_consumption", "home/energy/consumption".into());
        set("mqtt_topic_logs", "home/energy/logs".into());
        set("mqtt_topic_loxone", "home/loxone/logs".into());
        Self(values)
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SettingValue)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, key: String, value: SettingValue) {
        self.0.insert(key, value);
    }
}

impl FromIterator<(String, SettingValue)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (String, SettingValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Result of a successful save.
#[derive(Debug, Clone, Serialize)]
pub struct SaveOutcome {
    /// Effective configuration as persisted
    pub config: Configuration,

    /// Keys that were written
    pub applied: Vec<String>,

    /// Caller keys outside the schema, dropped
    pub ignored: Vec<String>,
}

/// Owner of the persisted configuration document.
pub struct ConfigStore {
    path: PathBuf,
    defaults: Configuration,
    /// Serializes load-merge-save within this process
    write_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>, defaults: Configuration) -> Self {
        Self {
            path: path.into(),
            defaults,
            write_lock: Mutex::new(()),
        }
    }

    /// Store for the plugin's settings document with the plugin defaults.
    pub fn plugin(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Configuration::plugin_defaults())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn defaults(&self) -> &Configuration {
        &self.defaults
    }

    /// Effective configuration: defaults overlaid by the persisted document.
    ///
    /// A missing document yields the defaults. A document that is not a
    /// flat JSON object of strings and numbers is [`ControlError::ConfigCorrupt`].
    pub fn load(&self) -> ControlResult<Configuration> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(self.defaults.clone());
            }
            Err(e) => return Err(ControlError::Io(e)),
        };

        let persisted: BTreeMap<String, SettingValue> = serde_json::from_str(&content)
            .map_err(|e| {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "Configuration document is corrupt"
                );
                ControlError::ConfigCorrupt(e.to_string())
            })?;

        let mut effective = self.defaults.clone();
        for (key, value) in persisted {
            effective.insert(key, value);
        }
        Ok(effective)
    }

    /// Merge `updates` into the effective configuration and rewrite the document.
    ///
    /// Keys outside the default schema are ignored. Keys already persisted
    /// outside the schema are kept as they are.
    pub fn save<I>(&self, updates: I) -> ControlResult<SaveOutcome>
    where
        I: IntoIterator<Item = (String, SettingValue)>,
    {
        let _guard = self.write_lock.lock();

        let mut config = self.load()?;
        let mut applied = Vec::new();
        let mut ignored = Vec::new();

        for (key, value) in updates {
            match self.defaults.get(&key) {
                Some(default) => {
                    config.insert(key.clone(), value.coerce_like(default));
                    applied.push(key);
                }
                None => ignored.push(key),
            }
        }

        if !ignored.is_empty() {
            tracing::warn!(keys = ?ignored, "Ignoring unknown configuration keys");
        }

        self.write_document(&config)?;
        tracing::info!(path = %self.path.display(), keys = ?applied, "Configuration saved");

        Ok(SaveOutcome {
            config,
            applied,
            ignored,
        })
    }

    fn write_document(&self, config: &Configuration) -> ControlResult<()> {
        let mut json = serde_json::to_string_pretty(config)
            .map_err(|e| ControlError::ConfigWrite(e.to_string()))?;
        json.push('\n');
        write_atomic(&self.path, json.as_bytes()).map_err(|e| {
            tracing::error!(path = %self.path.display(), error = %e, "Configuration write failed");
            ControlError::ConfigWrite(e.to_string())
        })
    }
}

/// Replace `path` with `contents` via a sibling temporary file and a rename.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    // The temporary file starts out 0600; daemons running as other users
    // must keep reading the replaced document.
    let permissions = match std::fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => new_file_permissions(),
        Err(e) => return Err(e),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    if let Some(permissions) = permissions {
        tmp.as_file().set_permissions(permissions)?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn new_file_permissions() -> Option<std::fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<std::fs::Permissions> {
    None
}
