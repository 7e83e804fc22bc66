//! HTTP routes over [`ControlApi`](consumption_core::ControlApi).
//!
//! ```text
//! GET  /api/status                 dependency reachability
//! GET  /api/logs                   log catalog
//! GET  /api/logs/view?log=<id>     newest-first entries as JSON
//! GET  /api/logs/fragment?log=<id> newest-first entries as HTML divs
//! GET  /api/settings               effective plugin configuration
//! POST /api/settings               merge + save, then restart the daemon
//! GET  /api/manifest               compose manifest as text
//! PUT  /api/manifest               replace manifest, then restart the daemon
//! POST /api/jobs?job=<name>        start a batch job
//! ```
//!
//! Error bodies carry fixed messages only; details go to the log.

use std::collections::BTreeMap;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use consumption_core::{
    Applied, Configuration, ControlError, LogEntry, LogSource, LogView, SettingValue, StatusReport,
};
use serde::{Deserialize, Serialize};

use crate::context::AppState;
use crate::render;

const INVALID_LOG_MESSAGE: &str = "Invalid log file.";
const NO_JOB_MESSAGE: &str = "No job specified.";
const INVALID_JOB_MESSAGE: &str = "Invalid job specified.";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(handle_status))
        .route("/api/logs", get(handle_log_catalog))
        .route("/api/logs/view", get(handle_log_view))
        .route("/api/logs/fragment", get(handle_log_fragment))
        .route("/api/settings", get(handle_read_settings).post(handle_save_settings))
        .route("/api/manifest", get(handle_read_manifest).put(handle_replace_manifest))
        .route("/api/jobs", post(handle_trigger_job))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct LogQuery {
    log: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobQuery {
    job: Option<String>,
}

/// Log view as sent to the browser.
#[derive(Debug, Serialize)]
struct LogViewBody {
    log: String,
    entries: Vec<LogEntry>,
    total_lines: usize,
    truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

impl LogViewBody {
    fn unavailable(log: String) -> Self {
        Self {
            log,
            entries: Vec::new(),
            total_lines: 0,
            truncated: false,
            error: Some(render::UNAVAILABLE_MESSAGE),
        }
    }
}

impl From<LogView> for LogViewBody {
    fn from(view: LogView) -> Self {
        let truncated = view.is_truncated();
        Self {
            log: view.log,
            entries: view.entries,
            total_lines: view.total_lines,
            truncated,
            error: None,
        }
    }
}

/// Outcome of a save or replace that restarts the dependent service.
#[derive(Debug, Serialize)]
struct ChangeBody {
    saved: bool,
    restarted: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<Configuration>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ignored: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ChangeBody {
    fn applied<T>(applied: &Applied<T>, message: &str) -> Self {
        Self {
            saved: true,
            restarted: applied.restarted(),
            message: message.to_string(),
            config: None,
            ignored: Vec::new(),
            error: applied
                .restart_error
                .as_ref()
                .map(|_| "Saved, but the dependent service could not be restarted.".to_string()),
        }
    }

    fn failed(error: &str) -> Self {
        Self {
            saved: false,
            restarted: false,
            message: String::new(),
            config: None,
            ignored: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Status and logs
// ═══════════════════════════════════════════════════════════════════════════

async fn handle_status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.api().status().await)
}

async fn handle_log_catalog(State(state): State<AppState>) -> Json<Vec<LogSource>> {
    Json(state.api().log_catalog().to_vec())
}

async fn handle_log_view(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Response {
    match state.api().log_view(query.log.as_deref()).await {
        Ok(view) => Json(LogViewBody::from(view)).into_response(),
        Err(ControlError::InvalidLogIdentifier) => {
            (StatusCode::BAD_REQUEST, INVALID_LOG_MESSAGE).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Serving empty log view");
            let log = query.log.unwrap_or_else(|| consumption_core::DEFAULT_LOG.to_string());
            Json(LogViewBody::unavailable(log)).into_response()
        }
    }
}

async fn handle_log_fragment(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Response {
    match state.api().log_view(query.log.as_deref()).await {
        Ok(view) => Html(render::log_fragment(&view)).into_response(),
        Err(ControlError::InvalidLogIdentifier) => {
            (StatusCode::BAD_REQUEST, INVALID_LOG_MESSAGE).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Serving unavailable log fragment");
            Html(render::unavailable_fragment()).into_response()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Settings and manifest
// ═══════════════════════════════════════════════════════════════════════════

async fn handle_read_settings(State(state): State<AppState>) -> Response {
    match state.api().config().await {
        Ok(config) => Json(config).into_response(),
        Err(ControlError::ConfigCorrupt(_)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Settings file is corrupt.",
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Settings could not be read");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Settings could not be read.",
            )
                .into_response()
        }
    }
}

async fn handle_save_settings(
    State(state): State<AppState>,
    payload: Result<Json<BTreeMap<String, SettingValue>>, JsonRejection>,
) -> Json<ChangeBody> {
    let Json(updates) = match payload {
        Ok(updates) => updates,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected settings payload");
            return Json(ChangeBody::failed("Settings could not be parsed."));
        }
    };

    match state.api().save_config(updates.into_iter().collect()).await {
        Ok(applied) => {
            let mut body = ChangeBody::applied(&applied, "Settings saved successfully.");
            body.config = Some(applied.value.config);
            body.ignored = applied.value.ignored;
            Json(body)
        }
        Err(ControlError::ConfigCorrupt(_)) => Json(ChangeBody::failed(
            "Settings file is corrupt; nothing was saved.",
        )),
        Err(e) => {
            tracing::error!(error = %e, "Settings could not be saved");
            Json(ChangeBody::failed("Settings could not be saved."))
        }
    }
}

async fn handle_read_manifest(State(state): State<AppState>) -> Response {
    match state.api().manifest().await {
        Ok(text) => ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Manifest not found.").into_response(),
    }
}

async fn handle_replace_manifest(State(state): State<AppState>, body: String) -> Json<ChangeBody> {
    match state.api().replace_manifest(body).await {
        Ok(applied) => Json(ChangeBody::applied(&applied, "Manifest saved successfully.")),
        Err(e) => {
            tracing::error!(error = %e, "Manifest could not be replaced");
            Json(ChangeBody::failed("Manifest could not be saved."))
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Jobs
// ═══════════════════════════════════════════════════════════════════════════

async fn handle_trigger_job(
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> Response {
    let job = match query.job.as_deref() {
        Some(job) if !job.is_empty() => job,
        _ => return (StatusCode::BAD_REQUEST, NO_JOB_MESSAGE).into_response(),
    };

    match state.api().trigger_job(job) {
        Ok(ack) => ack.message.into_response(),
        Err(ControlError::UnknownJob(_)) => {
            (StatusCode::BAD_REQUEST, INVALID_JOB_MESSAGE).into_response()
        }
        Err(e) => {
            tracing::error!(job = %job, error = %e, "Job trigger failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Job could not be started.",
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{body::Body, http::Request};
    use consumption_core::{
        ControlApi, ControlResult, ControlSettings, JobLauncher, JobSpec, JobTable,
        ServiceController,
    };
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt; // for `oneshot`

    struct FakeController {
        fail: bool,
    }

    #[async_trait]
    impl ServiceController for FakeController {
        async fn restart(&self, service: &str) -> ControlResult<()> {
            if self.fail {
                return Err(ControlError::ServiceRestartFailed {
                    service: service.to_string(),
                    reason: "exit status: 1".to_string(),
                });
            }
            Ok(())
        }
    }

    fn settings_in(temp: &TempDir) -> ControlSettings {
        let mut settings = ControlSettings::default().with_data_dir(temp.path());
        settings.health_endpoints.clear();
        settings
    }

    fn app_with(settings: &ControlSettings, fail_restart: bool) -> Router {
        let api = ControlApi::from_settings(settings)
            .with_service_controller(Arc::new(FakeController { fail: fail_restart }));
        router(AppState::new(api))
    }

    fn app(temp: &TempDir) -> Router {
        app_with(&settings_in(temp), false)
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, String) {
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, json: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    // ============================================================================
    // Logs
    // ============================================================================

    #[tokio::test]
    async fn test_log_view_defaults_to_mqtt_daemon() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("mqtt_daemon.log"),
            "[2026-01-21 14:30:45] Connected\n\n[2026-01-21 14:31:00] [WARNING] Reconnecting\n",
        )
        .unwrap();

        let (status, body) = send(app(&temp), get("/api/logs/view")).await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["log"], "mqtt_daemon");
        assert_eq!(json["total_lines"], 2);
        assert_eq!(json["truncated"], false);
        assert_eq!(json["entries"][0]["severity"], "warning");
        assert_eq!(json["entries"][1]["text"], "[2026-01-21 14:30:45] Connected");
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn test_log_view_rejects_traversal() {
        let temp = TempDir::new().unwrap();

        for uri in [
            "/api/logs/view?log=../../etc/passwd",
            "/api/logs/view?log=%2Fetc%2Fpasswd",
            "/api/logs/view?log=unknown",
            "/api/logs/fragment?log=..%2F..%2Fetc%2Fshadow",
        ] {
            let (status, body) = send(app(&temp), get(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body, "Invalid log file.");
        }
    }

    #[tokio::test]
    async fn test_log_fragment_is_escaped_html() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("train_model.log"),
            "ok\n  [error] <script>alert(1)</script>  \n",
        )
        .unwrap();

        let (status, body) = send(app(&temp), get("/api/logs/fragment?log=train_model.log")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            "<div class=\"log-error\">[error] &lt;script&gt;alert(1)&lt;/script&gt;</div>\n\
             <div class=\"log-info\">ok</div>\n"
        );
    }

    #[tokio::test]
    async fn test_log_catalog() {
        let temp = TempDir::new().unwrap();

        let (status, body) = send(app(&temp), get("/api/logs")).await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_str(&body).unwrap();
        let sources = json.as_array().unwrap();
        assert!(sources
            .iter()
            .any(|s| s["id"] == "send_predictions" && s["file"] == "loxone_publish.log"));
    }

    // ============================================================================
    // Settings
    // ============================================================================

    #[tokio::test]
    async fn test_settings_defaults_then_save() {
        let temp = TempDir::new().unwrap();
        let settings = settings_in(&temp);

        let (status, body) = send(app_with(&settings, false), get("/api/settings")).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["mqtt_port"], 1883);
        assert_eq!(json["mqtt_broker"], "localhost");

        let (status, body) = send(
            app_with(&settings, false),
            post_json(
                "/api/settings",
                r#"{"mqtt_broker": "192.168.1.5", "mqtt_port": "1884", "evil": "x"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["saved"], true);
        assert_eq!(json["restarted"], true);
        assert_eq!(json["message"], "Settings saved successfully.");
        assert_eq!(json["ignored"][0], "evil");
        assert_eq!(json["config"]["mqtt_port"], 1884);

        let (_, body) = send(app_with(&settings, false), get("/api/settings")).await;
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["mqtt_broker"], "192.168.1.5");
        assert!(json.get("evil").is_none());
    }

    #[tokio::test]
    async fn test_settings_restart_failure_is_embedded() {
        let temp = TempDir::new().unwrap();
        let settings = settings_in(&temp);

        let (status, body) = send(
            app_with(&settings, true),
            post_json("/api/settings", r#"{"mqtt_username": "energy"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["saved"], true);
        assert_eq!(json["restarted"], false);
        assert!(json["error"].is_string());

        let persisted = fs::read_to_string(&settings.settings_file).unwrap();
        assert!(persisted.contains("\"energy\""));
    }

    #[tokio::test]
    async fn test_malformed_settings_payload() {
        let temp = TempDir::new().unwrap();
        let settings = settings_in(&temp);

        for payload in [r#"{"mqtt_broker": null}"#, "{broken"] {
            let (status, body) =
                send(app_with(&settings, false), post_json("/api/settings", payload)).await;
            assert_eq!(status, StatusCode::OK, "{payload}");
            let json: Value = serde_json::from_str(&body).unwrap();
            assert_eq!(json["saved"], false);
            assert_eq!(json["error"], "Settings could not be parsed.");
        }
        assert!(!settings.settings_file.exists());
    }

    #[tokio::test]
    async fn test_corrupt_settings() {
        let temp = TempDir::new().unwrap();
        let settings = settings_in(&temp);
        fs::write(&settings.settings_file, "mqtt_broker=oops").unwrap();

        let (status, _) = send(app_with(&settings, false), get("/api/settings")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, body) = send(
            app_with(&settings, false),
            post_json("/api/settings", r#"{"mqtt_broker": "a"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["saved"], false);
        assert_eq!(
            fs::read_to_string(&settings.settings_file).unwrap(),
            "mqtt_broker=oops"
        );
    }

    // ============================================================================
    // Manifest
    // ============================================================================

    #[tokio::test]
    async fn test_manifest_replace_and_read() {
        let temp = TempDir::new().unwrap();
        let settings = settings_in(&temp);

        let (status, _) = send(app_with(&settings, false), get("/api/manifest")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let manifest = "services:\n  mqtt_daemon:\n    image: python:3.11-slim\n";
        let req = Request::builder()
            .method("PUT")
            .uri("/api/manifest")
            .body(Body::from(manifest))
            .unwrap();
        let (status, body) = send(app_with(&settings, false), req).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["saved"], true);

        let (status, body) = send(app_with(&settings, false), get("/api/manifest")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, manifest);
    }

    // ============================================================================
    // Jobs and status
    // ============================================================================

    #[tokio::test]
    async fn test_job_validation() {
        let temp = TempDir::new().unwrap();

        for (uri, message) in [
            ("/api/jobs", "No job specified."),
            ("/api/jobs?job=", "No job specified."),
            ("/api/jobs?job=foo", "Invalid job specified."),
        ] {
            let req = Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap();
            let (status, body) = send(app(&temp), req).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body, message);
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_job_acknowledged() {
        let temp = TempDir::new().unwrap();
        let api = ControlApi::from_settings(&settings_in(&temp))
            .with_service_controller(Arc::new(FakeController { fail: false }))
            .with_jobs(JobLauncher::new(
                JobTable::new().with_job("train", JobSpec::new("true")),
            ));

        let req = Request::builder()
            .method("POST")
            .uri("/api/jobs?job=train")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(router(AppState::new(api)), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Train script started.");
    }

    #[tokio::test]
    async fn test_status_reports_database() {
        let temp = TempDir::new().unwrap();
        let settings = settings_in(&temp);

        let (status, body) = send(app_with(&settings, false), get("/api/status")).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["database"], false);

        fs::write(&settings.database_file, b"").unwrap();
        let (_, body) = send(app_with(&settings, false), get("/api/status")).await;
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["database"], true);
    }
}
