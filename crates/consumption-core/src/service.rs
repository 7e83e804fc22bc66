//! Restarts of dependent container-managed services.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{ControlError, ControlResult};

/// Restarts a named dependent service.
#[async_trait]
pub trait ServiceController: Send + Sync {
    async fn restart(&self, service: &str) -> ControlResult<()>;
}

/// Restarts services through `docker compose -f <manifest> restart <service>`.
///
/// Arguments are passed as a vector; no shell is involved, so service names
/// and paths are never interpreted.
#[derive(Debug, Clone)]
pub struct ComposeController {
    program: PathBuf,
    manifest: PathBuf,
    timeout: Duration,
}

impl ComposeController {
    pub fn new(
        program: impl Into<PathBuf>,
        manifest: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            manifest: manifest.into(),
            timeout,
        }
    }

    fn command(&self, service: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("compose")
            .arg("-f")
            .arg(&self.manifest)
            .arg("restart")
            .arg(service)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ServiceController for ComposeController {
    async fn restart(&self, service: &str) -> ControlResult<()> {
        let failed = |reason: String| {
            tracing::warn!(service = %service, reason = %reason, "Service restart failed");
            ControlError::ServiceRestartFailed {
                service: service.to_string(),
                reason,
            }
        };

        tracing::info!(
            service = %service,
            manifest = %self.manifest.display(),
            "Restarting service"
        );

        let child = self
            .command(service)
            .spawn()
            .map_err(|e| failed(format!("spawn {}: {}", self.program.display(), e)))?;

        // On timeout the output future is dropped and kill_on_drop stops the child
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| failed(format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| failed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!("{}: {}", output.status, stderr.trim())));
        }

        tracing::info!(service = %service, "Service restarted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_fails_softly() {
        let controller = ComposeController::new(
            "/nonexistent/docker",
            "/nonexistent/docker-compose.yml",
            Duration::from_secs(1),
        );

        let err = controller.restart("mqtt_daemon").await.unwrap_err();
        match err {
            ControlError::ServiceRestartFailed { service, .. } => {
                assert_eq!(service, "mqtt_daemon")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        // `false` ignores its arguments and exits 1
        let controller =
            ComposeController::new("false", "docker-compose.yml", Duration::from_secs(5));

        let err = controller.restart("mqtt_daemon").await.unwrap_err();
        assert!(matches!(err, ControlError::ServiceRestartFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_exit_is_success() {
        let controller =
            ComposeController::new("true", "docker-compose.yml", Duration::from_secs(5));
        controller.restart("mqtt_daemon").await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_restart_times_out() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::Instant;

        let temp = tempfile::TempDir::new().unwrap();
        let script = temp.path().join("docker");
        std::fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let controller = ComposeController::new(
            &script,
            temp.path().join("docker-compose.yml"),
            Duration::from_millis(200),
        );

        let start = Instant::now();
        let err = controller.restart("mqtt_daemon").await.unwrap_err();
        let elapsed = start.elapsed();

        match err {
            ControlError::ServiceRestartFailed { reason, .. } => {
                assert!(reason.contains("timed out"), "unexpected reason: {reason}")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_secs(1));
    }
}
