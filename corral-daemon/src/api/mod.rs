//! HTTP API for agents and the dashboard.
//!
//! Thin translation layer: decode the request, call into corral-core, encode
//! the result. All fleet semantics live in the core crate.

use axum::extract::rejection::JsonRejection;
use axum::extract::{MatchedPath, Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use corral_core::observability::metrics::{record_api_request, record_report_rejected};
use corral_core::store::unix_now;
use corral_core::{fleet, CorralError, FleetRow, Gateway, HealthChecker, Report, Store, Thresholds};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<Store>,
    pub gateway: Gateway,
    pub health: HealthChecker,
    pub thresholds: Thresholds,
    /// Bearer token required on ingest. Empty disables auth.
    pub auth_token: String,
    pub history_default_hours: u32,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/api/metrics",
            post(ingest_report)
                .layer(middleware::from_fn_with_state(state.clone(), require_token)),
        )
        .route("/api/machines", get(list_machines))
        .route("/api/machines/{id}", get(machine_detail))
        .route("/api/machines/{id}/metrics", get(machine_history))
        .route("/api/stats", get(fleet_stats))
        .route("/api/health", get(health))
        .layer(middleware::from_fn(track_requests))
        .with_state(state)
}

/// Error wrapper that renders core errors as JSON API responses.
struct ApiError(CorralError);

impl From<CorralError> for ApiError {
    fn from(err: CorralError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CorralError::InvalidReport { .. } => StatusCode::BAD_REQUEST,
            CorralError::MachineNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("request failed: {}", self.0);
        }
        error_response(status, &self.0.to_string())
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "status": "error", "message": message }))).into_response()
}

/// Bearer-token check for the ingest endpoint. With no token configured the
/// endpoint is open, matching a trusted-LAN deployment.
async fn require_token(State(state): State<ApiState>, req: Request, next: Next) -> Response {
    if state.auth_token.is_empty() {
        return next.run(req).await;
    }

    let expected = format!("Bearer {}", state.auth_token);
    let ok = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);

    if !ok {
        record_report_rejected("unauthorized");
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized");
    }
    next.run(req).await
}

/// Per-request counters and latency, labelled by matched route so machine
/// ids don't blow up metric cardinality.
async fn track_requests(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let endpoint = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let response = next.run(req).await;
    record_api_request(&endpoint, response.status().as_u16(), start.elapsed().as_secs_f64());
    response
}

// POST /api/metrics - one report from one agent
async fn ingest_report(
    State(state): State<ApiState>,
    payload: Result<Json<Report>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(report) = payload.map_err(|e| {
        record_report_rejected("malformed_payload");
        CorralError::InvalidReport { reason: format!("malformed payload: {}", e) }
    })?;

    let machine_id = state.gateway.ingest(&report).await.map_err(|e| {
        if matches!(e, CorralError::InvalidReport { .. }) {
            record_report_rejected("missing_hostname");
        }
        e
    })?;

    info!(hostname = %report.hostname, machine_id, "report received");
    Ok((StatusCode::CREATED, Json(json!({ "status": "ok", "machine_id": machine_id }))))
}

// GET /api/machines - the full fleet view
async fn list_machines(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let rows = state.store.fleet_snapshot().await?;
    let view = fleet::build_view(rows, unix_now(), &state.thresholds);
    Ok(Json(json!({ "machines": view })))
}

// GET /api/machines/{id} - one machine with its latest sample
async fn machine_detail(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.store.machine_by_id(id).await?;
    let status = fleet::classify(&record, unix_now(), &state.thresholds);
    Ok(Json(FleetRow { record, status }))
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    hours: Option<u32>,
}

// GET /api/machines/{id}/metrics?hours=24 - sample history, newest first
async fn machine_history(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, ApiError> {
    let hours = params.hours.unwrap_or(state.history_default_hours);
    let window = Duration::from_secs(u64::from(hours) * 3600);
    let samples = state.store.history(id, window).await?;
    Ok(Json(json!({ "machine_id": id, "hours": hours, "metrics": samples })))
}

// GET /api/stats - aggregate fleet counters
async fn fleet_stats(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.store.aggregate_stats(&state.thresholds).await?;
    Ok(Json(stats))
}

// GET /api/health - daemon health rollup, always unauthenticated
async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.health.report().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn test_state(auth_token: &str) -> ApiState {
        let store = Arc::new(Store::new_in_memory().await.unwrap());
        ApiState {
            gateway: Gateway::new(store.clone()),
            store,
            health: HealthChecker::new(),
            thresholds: Thresholds::default(),
            auth_token: auth_token.to_string(),
            history_default_hours: 24,
        }
    }

    fn post_report(body: &str, token: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder()
            .method("POST")
            .uri("/api/metrics")
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    const REPORT: &str = r#"{
        "hostname": "barn-1", "ip": "10.0.0.7", "group": "pasture",
        "swarm_role": "worker", "cpu_percent": 17.5, "memory_percent": 42.0,
        "disk_percent": 61.0, "docker_running": 4, "docker_stopped": 1
    }"#;

    #[tokio::test]
    async fn ingest_then_list_round_trip() {
        let app = build_router(test_state("").await);

        let response = app.clone().oneshot(post_report(REPORT, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        let machine_id = body["machine_id"].as_i64().unwrap();

        let response = app
            .oneshot(HttpRequest::get("/api/machines").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let machines = body["machines"].as_array().unwrap();
        assert_eq!(machines.len(), 1);
        assert_eq!(machines[0]["id"].as_i64().unwrap(), machine_id);
        assert_eq!(machines[0]["hostname"], "barn-1");
        assert_eq!(machines[0]["group"], "pasture");
        assert_eq!(machines[0]["status"], "online");
        assert_eq!(machines[0]["metrics"]["docker_running"].as_i64().unwrap(), 4);
    }

    #[tokio::test]
    async fn missing_hostname_is_a_400() {
        let app = build_router(test_state("").await);

        let response =
            app.oneshot(post_report(r#"{"cpu_percent": 10.0}"#, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn malformed_payload_is_a_400_with_json_body() {
        let app = build_router(test_state("").await);

        let response = app.oneshot(post_report("{not json", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn ingest_requires_the_configured_token() {
        let app = build_router(test_state("sekrit").await);

        let response = app.clone().oneshot(post_report(REPORT, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.clone().oneshot(post_report(REPORT, Some("wrong"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.clone().oneshot(post_report(REPORT, Some("sekrit"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        // Reads stay open even when ingest is locked down.
        let response = app
            .oneshot(HttpRequest::get("/api/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_machine_is_a_404() {
        let app = build_router(test_state("").await);

        let response = app
            .clone()
            .oneshot(HttpRequest::get("/api/machines/99").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(HttpRequest::get("/api/machines/99/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn history_defaults_to_the_configured_window() {
        let app = build_router(test_state("").await);

        let response = app.clone().oneshot(post_report(REPORT, None)).await.unwrap();
        let machine_id = body_json(response).await["machine_id"].as_i64().unwrap();

        let uri = format!("/api/machines/{}/metrics", machine_id);
        let response =
            app.oneshot(HttpRequest::get(&uri).body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["hours"].as_u64().unwrap(), 24);
        assert_eq!(body["metrics"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stats_reflect_the_fleet() {
        let app = build_router(test_state("").await);

        app.clone().oneshot(post_report(REPORT, None)).await.unwrap();
        let hot = REPORT.replace("17.5", "96.0").replace("barn-1", "barn-2");
        app.clone().oneshot(post_report(&hot, None)).await.unwrap();

        let response = app
            .oneshot(HttpRequest::get("/api/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["total_machines"].as_i64().unwrap(), 2);
        assert_eq!(body["online"].as_i64().unwrap(), 1);
        assert_eq!(body["warning"].as_i64().unwrap(), 1);
        assert_eq!(body["offline"].as_i64().unwrap(), 0);
        assert_eq!(body["total_containers"].as_i64().unwrap(), 8);
    }
}
