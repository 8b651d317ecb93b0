//! Web server for the dashboard page and its JSON API

use axum::{
    Json, Router,
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use super::protocol::ServerMessage;
use super::watcher::ChangeNotifier;
use crate::config::ResolvedConfig;
use crate::metrics::get_metrics;
use crate::models::parse_timestamp;
use crate::mutator::{IssueMutator, validate_issue_id};
use crate::storage::load_issues_async;

pub use crate::config::DEFAULT_PORT;

/// How many ports past the requested one [`find_available_port`] tries.
const PORT_SEARCH_SPAN: u16 = 100;

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Issue log read on every request
    pub data_file: PathBuf,
    /// Name of the project folder (for display in the page title)
    pub project_name: String,
    /// Broadcast channel for sending updates to WebSocket clients
    pub update_tx: broadcast::Sender<String>,
    pub mutator: IssueMutator,
    /// Whether the change notifier is running
    pub live_refresh: bool,
}

impl AppState {
    pub fn new(data_file: PathBuf, project_name: impl Into<String>, mutator: IssueMutator) -> Self {
        let (update_tx, _) = broadcast::channel(100);
        Self {
            data_file,
            project_name: project_name.into(),
            update_tx,
            mutator,
            live_refresh: false,
        }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(
            config.data_file.value.clone(),
            project_name(&config.project_root),
            IssueMutator::from_config(config),
        )
    }

    /// Tell every connected client to refetch.
    pub fn notify_refresh(&self) {
        let _ = self.update_tx.send(ServerMessage::reload_now().to_json());
    }
}

fn project_name(root: &Path) -> String {
    root.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("Unknown")
        .to_string()
}

/// All routes, bound to `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/api/config", get(get_config))
        .route("/api/issues", get(get_issues))
        .route("/api/issues/:id", post(update_issue))
        .route("/api/metrics", get(get_metrics_handler))
        .route("/ws", get(super::websocket::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `state` on an already-bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Start the dashboard with live refresh and block until Ctrl+C or SIGTERM.
pub async fn start_server(config: &ResolvedConfig) -> crate::Result<()> {
    let mut state = AppState::from_config(config);

    // Keep the notifier alive for as long as the server runs
    let _notifier = match ChangeNotifier::start(
        &config.store_dir(),
        state.update_tx.clone(),
        config.debounce(),
    ) {
        Ok(notifier) => {
            state.live_refresh = true;
            Some(notifier)
        }
        Err(e) => {
            tracing::warn!(error = %e, "file watcher unavailable, live refresh disabled");
            None
        }
    };

    let host_addr: IpAddr = config.host.value.parse().map_err(|e| {
        crate::Error::Config(format!("Invalid host address '{}': {}", config.host.value, e))
    })?;
    let addr = SocketAddr::from((host_addr, config.port.value));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(
        url = %format!("http://{}", addr),
        data_file = %state.data_file.display(),
        live_refresh = state.live_refresh,
        "dashboard started"
    );

    serve(listener, state, shutdown_signal()).await?;
    tracing::info!("dashboard stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// First port at or after `start` that `host` can bind, if any.
pub fn find_available_port(host: &str, start: u16) -> Option<u16> {
    let host_addr: IpAddr = host.parse().ok()?;
    (start..=start.saturating_add(PORT_SEARCH_SPAN))
        .find(|&port| std::net::TcpListener::bind(SocketAddr::from((host_addr, port))).is_ok())
}

/// Serve the main HTML page
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("index.html"))
}

async fn get_config(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "project_name": state.project_name,
        "data_file": state.data_file.display().to_string(),
        "live_refresh": state.live_refresh,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn get_issues(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let issues = load_issues_async(&state.data_file)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(serde_json::json!({ "issues": issues })))
}

#[derive(Debug, Deserialize)]
struct MetricsQuery {
    now: Option<String>,
}

async fn get_metrics_handler(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let now = match query.now.as_deref() {
        Some(raw) => parse_timestamp(raw).ok_or_else(|| {
            api_error(StatusCode::BAD_REQUEST, format!("Invalid timestamp: {}", raw))
        })?,
        None => chrono::Utc::now(),
    };

    let issues = load_issues_async(&state.data_file)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(serde_json::json!({ "metrics": get_metrics(&issues, now) })))
}

#[derive(Debug, Deserialize)]
struct UpdateIssueRequest {
    description: String,
}

/// Replace an issue's description via the external CLI
async fn update_issue(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(request): Json<UpdateIssueRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    validate_issue_id(&id).map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let mutator = state.mutator.clone();
    let target = id.clone();
    let outcome =
        tokio::task::spawn_blocking(move || mutator.update_description(&target, &request.description))
            .await
            .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    match outcome {
        Ok(()) => {
            state.notify_refresh();
            Ok(Json(serde_json::json!({ "success": true, "id": id })))
        }
        Err(crate::Error::InvalidInput(msg)) => Err(api_error(StatusCode::BAD_REQUEST, msg)),
        Err(e) => {
            tracing::warn!(id = %id, error = %e, "issue update failed");
            Err(api_error(StatusCode::BAD_GATEWAY, e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const LOG: &str = concat!(
        r#"{"id":"bd-1","title":"Done","status":"closed","created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-03T00:00:00Z"}"#,
        "\n",
        r#"{"id":"bd-2","title":"Old","status":"open","created_at":"2024-01-01T00:00:00Z"}"#,
        "\n",
        "not json\n",
    );

    fn state_with(dir: &TempDir, log: Option<&str>, mutator_program: &str) -> AppState {
        let data_file = dir.path().join("issues.jsonl");
        if let Some(log) = log {
            fs::write(&data_file, log).unwrap();
        }
        let mutator = IssueMutator::new(mutator_program, dir.path(), Duration::from_secs(5));
        AppState::new(data_file, "demo", mutator)
    }

    async fn call(state: AppState, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = build_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_description(id: &str, description: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/api/issues/{}", id))
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({ "description": description }).to_string(),
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn test_index_is_html() {
        let dir = TempDir::new().unwrap();
        let response = build_router(state_with(&dir, None, "true"))
            .oneshot(get("/"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("<html"));
    }

    #[tokio::test]
    async fn test_config_endpoint() {
        let dir = TempDir::new().unwrap();
        let (status, json) = call(state_with(&dir, None, "true"), get("/api/config")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["project_name"], "demo");
        assert_eq!(json["live_refresh"], false);
        assert!(json["data_file"].as_str().unwrap().ends_with("issues.jsonl"));
    }

    #[tokio::test]
    async fn test_issues_skip_malformed_lines() {
        let dir = TempDir::new().unwrap();
        let (status, json) = call(state_with(&dir, Some(LOG), "true"), get("/api/issues")).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = json["issues"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["bd-1", "bd-2"]);
    }

    #[tokio::test]
    async fn test_metrics_with_fixed_now() {
        let dir = TempDir::new().unwrap();
        let (status, json) = call(
            state_with(&dir, Some(LOG), "true"),
            get("/api/metrics?now=2024-02-10T00:00:00Z"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let metrics = &json["metrics"];
        assert_eq!(metrics["lead_time"][0]["cycle_time_days"], 2);
        assert_eq!(metrics["aging_wip"][0]["age_days"], 40);
        assert_eq!(metrics["aging_wip"][0]["tier"], "red");
        assert_eq!(metrics["age_distribution"][3]["count"], 1);
    }

    #[tokio::test]
    async fn test_metrics_missing_file_is_null() {
        let dir = TempDir::new().unwrap();
        let (status, json) = call(state_with(&dir, None, "true"), get("/api/metrics")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["metrics"].is_null());
    }

    #[tokio::test]
    async fn test_metrics_bad_now_is_400() {
        let dir = TempDir::new().unwrap();
        let (status, json) = call(
            state_with(&dir, Some(LOG), "true"),
            get("/api/metrics?now=yesterday"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("yesterday"));
    }

    #[tokio::test]
    async fn test_update_invalid_id_is_400() {
        let dir = TempDir::new().unwrap();
        let (status, _) = call(
            state_with(&dir, Some(LOG), "true"),
            post_description("-rf", "x"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_mutator_failure_is_502() {
        let dir = TempDir::new().unwrap();
        let (status, json) = call(
            state_with(&dir, Some(LOG), "flowboard-no-such-program"),
            post_description("bd-1", "x"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(json["error"].is_string());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_update_success_broadcasts_reload() {
        let dir = TempDir::new().unwrap();
        let state = state_with(&dir, Some(LOG), "true");
        let mut rx = state.update_tx.subscribe();

        let (status, json) = call(state, post_description("bd-2", "new body")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["id"], "bd-2");

        let msg = rx.try_recv().unwrap();
        assert!(msg.contains("\"reload\""));
    }

    #[test]
    fn test_find_available_port() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let found = find_available_port("127.0.0.1", port).unwrap();
        assert_ne!(found, port);
        assert!(find_available_port("not-an-ip", 3040).is_none());
    }

    #[test]
    fn test_project_name() {
        assert_eq!(project_name(Path::new("/work/my-repo")), "my-repo");
        assert_eq!(project_name(Path::new("/")), "Unknown");
    }
}
