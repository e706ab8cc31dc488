//! HTTP API for PingOps.
//!
//! Exposes the registry snapshot for display clients and the operator
//! actions: regenerate the target list, start/stop/delete targets, export.

use std::future::Future;
use std::path::{Component, PathBuf};
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::export::{ExportError, export_snapshot};
use crate::monitor::{CreateResult, MonitorError, MonitorRegistry, SnapshotRow, TargetId};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<MonitorRegistry>,
    /// Export path used when a request does not name one. Requested
    /// exports are written next to it.
    pub default_export_path: PathBuf,
    /// Origins allowed to call the API from a browser; empty means none.
    pub allowed_origins: Vec<String>,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    targets: usize,
}

/// Body of `POST /api/targets`: two newline-separated lists.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub addresses: String,
    #[serde(default)]
    pub names: String,
    /// Start the new targets right away.
    #[serde(default)]
    pub start: bool,
}

/// Body of `POST /api/export`.
#[derive(Debug, Default, Deserialize)]
pub struct ExportRequest {
    /// Bare file name, written in the directory of the default export path.
    pub path: Option<String>,
}

#[derive(Serialize)]
struct ExportResponse {
    path: String,
    rows: usize,
}

#[derive(Serialize)]
struct ActionResponse {
    id: TargetId,
    changed: bool,
}

#[derive(Serialize)]
struct CountResponse {
    count: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Errors returned by API handlers.
enum ApiError {
    Monitor(MonitorError),
    Export(ExportError),
    BadRequest(String),
    Internal(String),
}

impl From<MonitorError> for ApiError {
    fn from(e: MonitorError) -> Self {
        Self::Monitor(e)
    }
}

impl From<ExportError> for ApiError {
    fn from(e: ExportError) -> Self {
        Self::Export(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Monitor(e @ MonitorError::NotFound(_)) => (StatusCode::NOT_FOUND, e.to_string()),
            Self::Monitor(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Self::Export(e @ ExportError::Empty) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::Export(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        if status.is_server_error() {
            tracing::error!(error = %message, "API request failed");
        }
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Create the Axum router with all routes.
///
/// Cross-origin requests are only answered for `allowed_origins`.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.allowed_origins);
    let app_state = Arc::new(state);

    let router = Router::new()
        .route("/healthz", get(healthz_handler))
        .route(
            "/api/targets",
            get(list_handler).post(generate_handler).delete(clear_handler),
        )
        .route("/api/targets/start", post(start_all_handler))
        .route("/api/targets/stop", post(stop_all_handler))
        .route("/api/targets/{id}", axum::routing::delete(remove_handler))
        .route("/api/targets/{id}/start", post(start_handler))
        .route("/api/targets/{id}/stop", post(stop_handler))
        .route("/api/export", post(export_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        );

    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };
    router.with_state(app_state)
}

/// Serve `router` until `shutdown` resolves, then drain open connections.
///
/// The router (and the registry it holds) is dropped before this returns.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid allowed origin");
                None
            }
        })
        .collect();
    if origins.is_empty() {
        return None;
    }
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE]),
    )
}

/// Resolve the file an export request writes to.
///
/// A requested name must be a single plain file name; it lands in the
/// directory of the default export path.
fn export_destination(state: &AppState, requested: Option<&str>) -> Result<PathBuf, ApiError> {
    let Some(name) = requested else {
        return Ok(state.default_export_path.clone());
    };
    let mut components = std::path::Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(file)), None) => Ok(state
            .default_export_path
            .parent()
            .map(|dir| dir.join(file))
            .unwrap_or_else(|| PathBuf::from(file))),
        _ => Err(ApiError::BadRequest(format!(
            "export path must be a plain file name: '{name}'"
        ))),
    }
}

/// Liveness probe.
async fn healthz_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        targets: state.registry.len().await,
    })
}

/// Current snapshot, in creation order.
async fn list_handler(State(state): State<Arc<AppState>>) -> Json<Vec<SnapshotRow>> {
    Json(state.registry.snapshot().await)
}

/// Replace all targets from the submitted lists.
async fn generate_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<CreateResult>), ApiError> {
    let addresses: Vec<&str> = req.addresses.lines().collect();
    let names: Vec<&str> = req.names.lines().collect();

    let result = state.registry.create_from_input(&addresses[..], &names[..]).await;
    if req.start {
        state.registry.start_all().await?;
    }
    Ok((StatusCode::CREATED, Json(result)))
}

async fn clear_handler(State(state): State<Arc<AppState>>) -> Json<CountResponse> {
    Json(CountResponse {
        count: state.registry.clear().await,
    })
}

async fn start_all_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state.registry.start_all().await?;
    Ok(Json(CountResponse { count }))
}

async fn stop_all_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CountResponse>, ApiError> {
    let count = state.registry.stop_all().await?;
    Ok(Json(CountResponse { count }))
}

async fn start_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<ActionResponse>, ApiError> {
    let id = TargetId(id);
    let changed = state.registry.start(id).await?;
    Ok(Json(ActionResponse { id, changed }))
}

async fn stop_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<ActionResponse>, ApiError> {
    let id = TargetId(id);
    let changed = state.registry.stop(id).await?;
    Ok(Json(ActionResponse { id, changed }))
}

async fn remove_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    state.registry.remove(TargetId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Write the current snapshot to a spreadsheet.
async fn export_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExportRequest>,
) -> Result<Json<ExportResponse>, ApiError> {
    let path = export_destination(&state, req.path.as_deref())?;
    let rows = state.registry.snapshot().await;
    let count = rows.len();

    let written = tokio::task::spawn_blocking(move || export_snapshot(&rows, path))
        .await
        .map_err(|e| ApiError::Internal(format!("export task failed: {e}")))??;

    Ok(Json(ExportResponse {
        path: written.display().to_string(),
        rows: count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::MonitorSettings;
    use crate::probe::mock::ScriptedProber;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn create_test_state() -> AppState {
        let settings = MonitorSettings {
            interval: Duration::from_secs(3600),
            probe_on_start: false,
            ..Default::default()
        };
        let registry = MonitorRegistry::new(settings, Arc::new(ScriptedProber::always(true)))
            .await
            .expect("Failed to create registry");
        AppState {
            registry: Arc::new(registry),
            default_export_path: PathBuf::from("Ping_Results.xlsx"),
            allowed_origins: Vec::new(),
        }
    }

    fn preflight(uri: &str, origin: &str) -> Request<Body> {
        Request::builder()
            .method("OPTIONS")
            .uri(uri)
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_generate_and_list() {
        let state = create_test_state().await;
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/targets",
                serde_json::json!({"addresses": "10.0.0.1\n10.0.0.2\nbad host", "names": "gw"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["created"].as_array().unwrap().len(), 2);
        assert_eq!(body["rejected"][0]["line"], 3);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/targets")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let rows = body_json(response).await;
        assert_eq!(rows[0]["display_name"], "gw");
        assert_eq!(rows[1]["display_name"], "10.0.0.2");
        assert_eq!(rows[1]["status"], "UNKNOWN");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unknown_target_is_404() {
        let state = create_test_state().await;
        let app = create_router(state);

        let response = app
            .oneshot(json_request("POST", "/api/targets/42/start", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("42"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_export_empty_is_400() {
        let state = create_test_state().await;
        let app = create_router(state);

        let response = app
            .oneshot(json_request("POST", "/api/export", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_healthz() {
        let state = create_test_state().await;
        let app = create_router(state);

        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["targets"], 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_export_path_must_be_plain_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let victim = outside.path().join("victim.csv");
        std::fs::write(&victim, "precious,data\n").unwrap();

        let mut state = create_test_state().await;
        state.default_export_path = dir.path().join("Ping_Results.xlsx");
        state
            .registry
            .add_target(crate::monitor::Target::new("10.0.0.1", ""))
            .await;
        let app = create_router(state);

        for path in [
            victim.display().to_string(),
            "../victim.csv".to_string(),
            "nested/victim.csv".to_string(),
            "..".to_string(),
        ] {
            let response = app
                .clone()
                .oneshot(json_request("POST", "/api/export", serde_json::json!({ "path": &path })))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "path {path}");
        }
        assert_eq!(std::fs::read_to_string(&victim).unwrap(), "precious,data\n");

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/export",
                serde_json::json!({ "path": "night-shift.csv" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(dir.path().join("night-shift.csv").exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cross_origin_denied_by_default() {
        let state = create_test_state().await;
        let app = create_router(state);

        let response = app
            .oneshot(preflight("/api/export", "https://evil.example"))
            .await
            .unwrap();
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_cross_origin_allow_list() {
        let mut state = create_test_state().await;
        state.allowed_origins = vec!["http://localhost:3000".to_string()];
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(preflight("/api/targets", "http://localhost:3000"))
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:3000"
        );

        let response = app
            .oneshot(preflight("/api/export", "https://evil.example"))
            .await
            .unwrap();
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_serve_releases_registry_on_shutdown() {
        let state = create_test_state().await;
        let registry = Arc::clone(&state.registry);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let server = tokio::spawn(serve(listener, create_router(state), async move {
            let _ = rx.await;
        }));
        assert!(Arc::strong_count(&registry) > 1);

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();

        let registry = Arc::try_unwrap(registry).expect("router still holds the registry");
        registry.shutdown().await.unwrap();
    }
}
