//! Detached launches of the plugin's batch jobs.
//!
//! A launch hands the job to the OS and returns as soon as the process is
//! spawned. Output goes to the null device; jobs report through their own
//! log files. A background task reaps each child and tells the
//! [`JobObserver`], which is the only place completion is ever seen.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use serde::Serialize;
use tokio::process::Command;

use crate::error::{ControlError, ControlResult};

/// How to start one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl JobSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Run `script` from `bin_dir` with `interpreter`.
    pub fn script(interpreter: impl Into<PathBuf>, bin_dir: &Path, script: &str) -> Self {
        Self::new(interpreter).arg(bin_dir.join(script))
    }
}

/// The closed set of launchable jobs.
#[derive(Debug, Clone, Default)]
pub struct JobTable {
    jobs: BTreeMap<String, JobSpec>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job(mut self, name: impl Into<String>, spec: JobSpec) -> Self {
        self.jobs.insert(name.into(), spec);
        self
    }

    /// Training, prediction and evaluation scripts of the plugin.
    pub fn plugin(interpreter: impl Into<PathBuf>, bin_dir: impl AsRef<Path>) -> Self {
        let interpreter = interpreter.into();
        let bin_dir = bin_dir.as_ref();
        Self::new()
            .with_job("train", JobSpec::script(&interpreter, bin_dir, "train_model.py"))
            .with_job("predict", JobSpec::script(&interpreter, bin_dir, "prediction.py"))
            .with_job("evaluate", JobSpec::script(&interpreter, bin_dir, "evaluation.py"))
    }

    pub fn get(&self, name: &str) -> Option<&JobSpec> {
        self.jobs.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }
}

/// Receives job lifecycle notifications off the request path.
///
/// Launch never waits on an observer; implementations can add tracking
/// (in-flight guards, history) without changing the trigger contract.
pub trait JobObserver: Send + Sync {
    fn started(&self, job: &str, pid: Option<u32>);
    fn finished(&self, job: &str, status: std::io::Result<ExitStatus>);
}

/// Observer that only logs.
#[derive(Debug, Default)]
pub struct LogObserver;

impl JobObserver for LogObserver {
    fn started(&self, job: &str, pid: Option<u32>) {
        tracing::info!(job = %job, pid = ?pid, "Job started");
    }

    fn finished(&self, job: &str, status: std::io::Result<ExitStatus>) {
        match status {
            Ok(status) if status.success() => tracing::info!(job = %job, "Job finished"),
            Ok(status) => tracing::warn!(job = %job, status = %status, "Job exited unsuccessfully"),
            Err(e) => tracing::warn!(job = %job, error = %e, "Job could not be awaited"),
        }
    }
}

/// Acknowledgment returned to the caller of a launch.
#[derive(Debug, Clone, Serialize)]
pub struct JobAck {
    pub job: String,
    pub pid: Option<u32>,
    pub message: String,
}

/// Starts jobs from a [`JobTable`] without waiting for them.
#[derive(Clone)]
pub struct JobLauncher {
    table: JobTable,
    observer: Arc<dyn JobObserver>,
}

impl JobLauncher {
    pub fn new(table: JobTable) -> Self {
        Self::with_observer(table, Arc::new(LogObserver))
    }

    pub fn with_observer(table: JobTable, observer: Arc<dyn JobObserver>) -> Self {
        Self { table, observer }
    }

    pub fn table(&self) -> &JobTable {
        &self.table
    }

    /// Spawn the process for `job` and return immediately.
    ///
    /// Must be called within a tokio runtime; the reaper runs as a task.
    pub fn launch(&self, job: &str) -> ControlResult<JobAck> {
        let spec = self.table.get(job).ok_or_else(|| {
            tracing::debug!(job = %job, "Rejected unknown job");
            ControlError::UnknownJob(job.to_string())
        })?;

        let mut std_cmd = std::process::Command::new(&spec.program);
        std_cmd
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Own process group: signals aimed at the server leave jobs alone
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            std_cmd.process_group(0);
        }

        let mut child = Command::from(std_cmd).spawn().map_err(|e| {
            tracing::error!(
                job = %job,
                program = %spec.program.display(),
                error = %e,
                "Job spawn failed"
            );
            ControlError::JobLaunchFailed {
                job: job.to_string(),
                reason: e.to_string(),
            }
        })?;

        let pid = child.id();
        self.observer.started(job, pid);

        let observer = Arc::clone(&self.observer);
        let name = job.to_string();
        tokio::spawn(async move {
            let status = child.wait().await;
            observer.finished(&name, status);
        });

        Ok(JobAck {
            job: job.to_string(),
            pid,
            message: format!("{} script started.", capitalize(job)),
        })
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct RecordingObserver {
        started: Mutex<Vec<String>>,
        finished: Mutex<Vec<(String, bool)>>,
    }

    impl JobObserver for RecordingObserver {
        fn started(&self, job: &str, _pid: Option<u32>) {
            self.started.lock().push(job.to_string());
        }

        fn finished(&self, job: &str, status: std::io::Result<ExitStatus>) {
            let ok = status.map(|s| s.success()).unwrap_or(false);
            self.finished.lock().push((job.to_string(), ok));
        }
    }

    #[test]
    fn test_plugin_table() {
        let table = JobTable::plugin("/usr/bin/python3", "/opt/bin");
        let names: Vec<_> = table.names().collect();
        assert_eq!(names, vec!["evaluate", "predict", "train"]);

        let train = table.get("train").unwrap();
        assert_eq!(train.program, PathBuf::from("/usr/bin/python3"));
        assert_eq!(train.args, vec![OsString::from("/opt/bin/train_model.py")]);
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("train"), "Train");
        assert_eq!(capitalize(""), "");
    }

    #[tokio::test]
    async fn test_unknown_job_rejected_without_spawn() {
        let observer = Arc::new(RecordingObserver::default());
        let launcher = JobLauncher::with_observer(
            JobTable::new().with_job("train", JobSpec::new("/nonexistent/python")),
            observer.clone(),
        );

        let err = launcher.launch("foo").unwrap_err();
        assert!(matches!(err, ControlError::UnknownJob(ref name) if name == "foo"));
        assert!(observer.started.lock().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_failure_reported() {
        let launcher = JobLauncher::new(
            JobTable::new().with_job("train", JobSpec::new("/nonexistent/python")),
        );

        let err = launcher.launch("train").unwrap_err();
        assert!(matches!(err, ControlError::JobLaunchFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_returns_before_job_finishes() {
        let observer = Arc::new(RecordingObserver::default());
        let launcher = JobLauncher::with_observer(
            JobTable::new().with_job("train", JobSpec::new("sleep").arg("5")),
            observer.clone(),
        );

        let start = Instant::now();
        let ack = launcher.launch("train").unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(ack.message, "Train script started.");
        assert!(ack.pid.is_some());
        assert_eq!(*observer.started.lock(), vec!["train".to_string()]);
        assert!(observer.finished.lock().is_empty());

        if let Some(pid) = ack.pid {
            let _ = std::process::Command::new("kill").arg(pid.to_string()).status();
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_observer_sees_exit() {
        let observer = Arc::new(RecordingObserver::default());
        let launcher = JobLauncher::with_observer(
            JobTable::new()
                .with_job("predict", JobSpec::new("true"))
                .with_job("evaluate", JobSpec::new("false")),
            observer.clone(),
        );

        launcher.launch("predict").unwrap();
        launcher.launch("evaluate").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while observer.finished.lock().len() < 2 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let mut finished = observer.finished.lock().clone();
        finished.sort();
        assert_eq!(
            finished,
            vec![("evaluate".to_string(), false), ("predict".to_string(), true)]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_same_job_may_run_twice() {
        let launcher = JobLauncher::new(JobTable::new().with_job("train", JobSpec::new("true")));
        launcher.launch("train").unwrap();
        launcher.launch("train").unwrap();
    }
}
