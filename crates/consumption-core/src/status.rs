//! Reachability of the plugin's dependencies.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::settings::HealthEndpoint;

/// Health of one dependent service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceHealth {
    pub name: String,
    pub url: String,
    pub reachable: bool,
}

impl fmt::Display for ServiceHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.reachable { "found" } else { "not found" };
        write!(f, "{}: {}", self.name, state)
    }
}

/// Snapshot of every dependency check.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Database file present
    pub database: bool,
    pub services: Vec<ServiceHealth>,
}

impl StatusReport {
    pub fn all_ok(&self) -> bool {
        self.database && self.services.iter().all(|s| s.reachable)
    }
}

/// Probes the database file and HTTP health endpoints.
#[derive(Debug, Clone)]
pub struct StatusProbe {
    database_file: PathBuf,
    endpoints: Vec<HealthEndpoint>,
    timeout: Duration,
}

impl StatusProbe {
    pub fn new(
        database_file: impl Into<PathBuf>,
        endpoints: Vec<HealthEndpoint>,
        timeout: Duration,
    ) -> Self {
        Self {
            database_file: database_file.into(),
            endpoints,
            timeout,
        }
    }

    /// Run every check. Never fails; problems show up as `false`.
    pub async fn check(&self) -> StatusReport {
        let database = tokio::fs::try_exists(&self.database_file)
            .await
            .unwrap_or(false);

        let client = match reqwest::Client::builder()
            .timeout(self.timeout)
            .no_proxy()
            .build()
        {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build HTTP client");
                None
            }
        };

        let probes = self.endpoints.iter().map(|endpoint| {
            let client = client.clone();
            async move {
                let reachable = match client {
                    Some(client) => check_http(&client, &endpoint.url).await,
                    None => false,
                };
                ServiceHealth {
                    name: endpoint.name.clone(),
                    url: endpoint.url.clone(),
                    reachable,
                }
            }
        });
        let services = futures::future::join_all(probes).await;

        StatusReport { database, services }
    }
}

async fn check_http(client: &reqwest::Client, url: &str) -> bool {
    match client.get(url).send().await {
        Ok(res) => res.status().is_success(),
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "Health probe failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{addr}/health")
    }

    #[tokio::test]
    async fn test_database_presence() {
        let temp = TempDir::new().unwrap();
        let db = temp.path().join("energy_data.sqlite");

        let probe = StatusProbe::new(&db, Vec::new(), Duration::from_secs(1));
        assert!(!probe.check().await.database);

        std::fs::write(&db, b"").unwrap();
        let report = probe.check().await;
        assert!(report.database);
        assert!(report.all_ok());
    }

    #[tokio::test]
    async fn test_healthy_and_failing_endpoints() {
        let healthy = serve_once("HTTP/1.1 200 OK").await;
        let failing = serve_once("HTTP/1.1 503 Service Unavailable").await;

        let probe = StatusProbe::new(
            "/nonexistent/energy_data.sqlite",
            vec![
                HealthEndpoint::new("influxdb", healthy),
                HealthEndpoint::new("grafana", failing),
            ],
            Duration::from_secs(2),
        );

        let report = probe.check().await;
        assert!(report.services[0].reachable);
        assert!(!report.services[1].reachable);
        assert!(!report.all_ok());
        assert_eq!(report.services[1].to_string(), "grafana: not found");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = StatusProbe::new(
            "/nonexistent/energy_data.sqlite",
            vec![HealthEndpoint::new("influxdb", format!("http://{addr}/health"))],
            Duration::from_millis(500),
        );

        let report = probe.check().await;
        assert!(!report.services[0].reachable);
    }
}
