//! Request/response operations over the control subsystem.
//!
//! [`ControlApi`] is the only component that sequences the others:
//!
//! ```text
//! log_view        -> PathResolver -> LogReader
//! save_config     -> ConfigStore  -> ServiceController
//! replace_manifest-> ManifestStore -> ServiceController
//! trigger_job     -> JobLauncher
//! status          -> StatusProbe
//! ```
//!
//! Blocking file I/O runs on the blocking pool so the API can be called from
//! request handlers directly.

use std::path::Path;
use std::sync::Arc;

use crate::config::{ConfigStore, Configuration, SaveOutcome, SettingValue};
use crate::error::{ControlError, ControlResult};
use crate::jobs::{JobAck, JobLauncher, JobTable};
use crate::logs::{LogCatalog, LogReader, LogSource, LogView, PathResolver, DEFAULT_LOG};
use crate::manifest::ManifestStore;
use crate::service::{ComposeController, ServiceController};
use crate::settings::ControlSettings;
use crate::status::{StatusProbe, StatusReport};

/// A change that was persisted, plus the outcome of the restart it raised.
///
/// A failed restart never undoes the change.
#[derive(Debug)]
pub struct Applied<T> {
    pub value: T,
    pub restart_error: Option<ControlError>,
}

impl<T> Applied<T> {
    pub fn restarted(&self) -> bool {
        self.restart_error.is_none()
    }
}

/// Composition of every control component.
pub struct ControlApi {
    resolver: PathResolver,
    reader: LogReader,
    config: Arc<ConfigStore>,
    manifest: ManifestStore,
    services: Arc<dyn ServiceController>,
    dependent_service: String,
    jobs: JobLauncher,
    status: StatusProbe,
}

impl ControlApi {
    /// Wire the plugin's components from `settings`.
    pub fn from_settings(settings: &ControlSettings) -> Self {
        Self {
            resolver: PathResolver::new(&settings.log_dir, LogCatalog::plugin()),
            reader: LogReader::default(),
            config: Arc::new(ConfigStore::plugin(&settings.settings_file)),
            manifest: ManifestStore::new(&settings.manifest_file),
            services: Arc::new(ComposeController::new(
                &settings.compose_program,
                &settings.manifest_file,
                settings.restart_timeout(),
            )),
            dependent_service: settings.dependent_service.clone(),
            jobs: JobLauncher::new(JobTable::plugin(&settings.interpreter, &settings.bin_dir)),
            status: StatusProbe::new(
                &settings.database_file,
                settings.health_endpoints.clone(),
                settings.probe_timeout(),
            ),
        }
    }

    /// Replace the service controller (tests, alternative container managers).
    pub fn with_service_controller(mut self, services: Arc<dyn ServiceController>) -> Self {
        self.services = services;
        self
    }

    pub fn with_jobs(mut self, jobs: JobLauncher) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_reader(mut self, reader: LogReader) -> Self {
        self.reader = reader;
        self
    }

    pub fn log_dir(&self) -> &Path {
        self.resolver.log_dir()
    }

    pub fn dependent_service(&self) -> &str {
        &self.dependent_service
    }

    pub fn jobs(&self) -> &JobLauncher {
        &self.jobs
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Logs
    // ═══════════════════════════════════════════════════════════════════════

    pub fn log_catalog(&self) -> &[LogSource] {
        self.resolver.catalog().sources()
    }

    /// Newest-first view of a log. `None` selects the default log.
    pub async fn log_view(&self, requested: Option<&str>) -> ControlResult<LogView> {
        self.log_view_with(requested, self.reader).await
    }

    /// Like [`log_view`](Self::log_view) with a caller-chosen entry limit.
    pub async fn log_tail(&self, requested: Option<&str>, limit: usize) -> ControlResult<LogView> {
        self.log_view_with(requested, LogReader::with_limit(limit)).await
    }

    async fn log_view_with(
        &self,
        requested: Option<&str>,
        reader: LogReader,
    ) -> ControlResult<LogView> {
        let requested = requested.unwrap_or(DEFAULT_LOG).to_string();
        let resolver = self.resolver.clone();

        blocking(move || {
            let path = resolver.resolve(&requested)?;
            let id = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|file| resolver.catalog().find(file))
                .map(|source| source.id.clone())
                .unwrap_or(requested);
            reader.read(&id, &path)
        })
        .await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Configuration
    // ═══════════════════════════════════════════════════════════════════════

    pub async fn config(&self) -> ControlResult<Configuration> {
        let store = Arc::clone(&self.config);
        blocking(move || store.load()).await
    }

    /// Persist `updates`, then restart the dependent service.
    pub async fn save_config(
        &self,
        updates: Vec<(String, SettingValue)>,
    ) -> ControlResult<Applied<SaveOutcome>> {
        let store = Arc::clone(&self.config);
        let outcome = blocking(move || store.save(updates)).await?;
        let restart_error = self.restart_dependent().await;
        Ok(Applied {
            value: outcome,
            restart_error,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Manifest
    // ═══════════════════════════════════════════════════════════════════════

    pub async fn manifest(&self) -> ControlResult<String> {
        let store = self.manifest.clone();
        blocking(move || store.read()).await
    }

    /// Replace the manifest verbatim, then restart the dependent service.
    pub async fn replace_manifest(&self, contents: String) -> ControlResult<Applied<()>> {
        let store = self.manifest.clone();
        blocking(move || store.replace(&contents)).await?;
        let restart_error = self.restart_dependent().await;
        Ok(Applied {
            value: (),
            restart_error,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Jobs and status
    // ═══════════════════════════════════════════════════════════════════════

    /// Start `job` detached; returns once the process is spawned.
    pub fn trigger_job(&self, job: &str) -> ControlResult<JobAck> {
        self.jobs.launch(job)
    }

    pub async fn status(&self) -> StatusReport {
        self.status.check().await
    }

    async fn restart_dependent(&self) -> Option<ControlError> {
        self.services.restart(&self.dependent_service).await.err()
    }
}

async fn blocking<T, F>(f: F) -> ControlResult<T>
where
    F: FnOnce() -> ControlResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ControlError::Io(std::io::Error::other(e)))?
}
