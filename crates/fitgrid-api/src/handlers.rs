//! REST API handlers.
//!
//! Each handler calls into the shared `Coordinator` and returns the JSON
//! envelope. Malformed bodies and query strings are answered with 400.

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{Extensions, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use fitgrid_core::config::save_weights_file;
use fitgrid_core::{DEFAULT_ENERGY_WATTS, SystemLoad, TaskId, Telemetry, round3};
use fitgrid_scheduler::{SchedulerError, Selection, TaskRequestOutcome};

use crate::ApiState;

/// Decision records returned when `?limit=` is absent.
const DEFAULT_DECISION_LIMIT: usize = 20;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

fn bad_body(rejection: JsonRejection) -> Response {
    error_response(&rejection.body_text(), StatusCode::BAD_REQUEST)
}

/// Use the body's node id, or the peer IP when it is absent or blank.
fn resolve_node_id(explicit: Option<String>, extensions: &Extensions) -> Option<String> {
    explicit
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
}

fn rounded(scores: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    scores.iter().map(|(id, s)| (id.clone(), round3(*s))).collect()
}

fn default_energy_watts() -> f64 {
    DEFAULT_ENERGY_WATTS
}

fn default_success() -> bool {
    true
}

// ── Health ─────────────────────────────────────────────────────

/// GET /health
pub async fn health() -> impl IntoResponse {
    ApiResponse::ok(json!({ "status": "ok" }))
}

// ── Nodes ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub node_id: String,
    #[serde(default = "default_energy_watts")]
    pub energy_watts: f64,
}

/// POST /register
pub async fn register_node(
    State(state): State<ApiState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    let node_id = req.node_id.trim();
    if node_id.is_empty() {
        return error_response("node_id is required", StatusCode::BAD_REQUEST);
    }

    let created = state.coordinator.register_node(node_id, req.energy_watts).await;
    ApiResponse::ok(json!({
        "status": "registered",
        "node_id": node_id,
        "energy_watts": req.energy_watts,
        "created": created,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct MetricsRequest {
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(flatten)]
    pub telemetry: Telemetry,
}

/// POST /update_metrics
pub async fn update_metrics(
    State(state): State<ApiState>,
    extensions: Extensions,
    body: Result<Json<MetricsRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    let Some(node_id) = resolve_node_id(req.node_id, &extensions) else {
        return error_response("node_id is required", StatusCode::BAD_REQUEST);
    };

    let created = state.coordinator.report_telemetry(&node_id, req.telemetry).await;
    ApiResponse::ok(json!({
        "status": "updated",
        "node_id": node_id,
        "created": created,
    }))
    .into_response()
}

// ── Tasks ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubmitTaskRequest {
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// POST /tasks
pub async fn submit_task(
    State(state): State<ApiState>,
    body: Result<Json<SubmitTaskRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    let task_id = state.coordinator.submit_task(req.payload).await;
    (StatusCode::CREATED, ApiResponse::ok(json!({ "task_id": task_id }))).into_response()
}

/// GET /tasks/{id}
pub async fn get_task(State(state): State<ApiState>, Path(id): Path<TaskId>) -> Response {
    match state.coordinator.get_task(id).await {
        Some(task) => ApiResponse::ok(task).into_response(),
        None => error_response("task not found", StatusCode::NOT_FOUND),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskRequest {
    #[serde(default)]
    pub node_id: Option<String>,
}

/// POST /request_task
///
/// The body is optional; without one the peer address names the node.
pub async fn request_task(
    State(state): State<ApiState>,
    extensions: Extensions,
    body: Result<Option<Json<TaskRequest>>, JsonRejection>,
) -> Response {
    let req = match body {
        Ok(Some(Json(req))) => req,
        Ok(None) => TaskRequest::default(),
        Err(rejection) => return bad_body(rejection),
    };
    let Some(node_id) = resolve_node_id(req.node_id, &extensions) else {
        return error_response("node_id is required", StatusCode::BAD_REQUEST);
    };

    let outcome = state.coordinator.request_task(&node_id).await;
    if let TaskRequestOutcome::Assigned { task } = &outcome {
        info!(task_id = task.id, %node_id, "task handed out");
    }
    ApiResponse::ok(outcome).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CompleteTaskRequest {
    pub task_id: TaskId,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default = "default_success")]
    pub success: bool,
}

/// POST /complete_task
pub async fn complete_task(
    State(state): State<ApiState>,
    extensions: Extensions,
    body: Result<Json<CompleteTaskRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    let Some(node_id) = resolve_node_id(req.node_id, &extensions) else {
        return error_response("node_id is required", StatusCode::BAD_REQUEST);
    };

    match state
        .coordinator
        .report_completion(req.task_id, &node_id, req.result, req.success)
        .await
    {
        Ok(task) => ApiResponse::ok(task).into_response(),
        Err(e @ SchedulerError::TaskNotFound(_)) => {
            error_response(&e.to_string(), StatusCode::NOT_FOUND)
        }
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

#[derive(Debug, Deserialize)]
pub struct PerformanceRequest {
    pub node_id: String,
    pub task_time: f64,
    #[serde(default = "default_success")]
    pub success: bool,
}

/// POST /update_performance
pub async fn update_performance(
    State(state): State<ApiState>,
    body: Result<Json<PerformanceRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };
    if req.node_id.trim().is_empty() {
        return error_response("node_id is required", StatusCode::BAD_REQUEST);
    }

    state
        .coordinator
        .record_performance(&req.node_id, req.task_time, req.success)
        .await;
    ApiResponse::ok(json!({
        "status": "performance_updated",
        "node_id": req.node_id,
    }))
    .into_response()
}

// ── Selection & status ─────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct BestNodeQuery {
    pub system_load: Option<String>,
}

fn parse_load(query: BestNodeQuery) -> Result<SystemLoad, Response> {
    match query.system_load.as_deref() {
        None => Ok(SystemLoad::default()),
        Some(raw) => raw
            .parse::<SystemLoad>()
            .map_err(|e| error_response(&e.to_string(), StatusCode::BAD_REQUEST)),
    }
}

fn selection_response(selection: Selection) -> Response {
    ApiResponse::ok(json!({
        "best_node": selection.node_id,
        "score": round3(selection.score),
        "all_scores": rounded(&selection.scores),
        "method": selection.method,
        "system_load": selection.system_load,
    }))
    .into_response()
}

/// GET /get_best_node?system_load=
///
/// Score only; answers without waiting on the advisor.
pub async fn get_best_node(
    State(state): State<ApiState>,
    Query(query): Query<BestNodeQuery>,
) -> Response {
    match parse_load(query) {
        Ok(load) => selection_response(state.coordinator.best_node(load).await),
        Err(resp) => resp,
    }
}

/// GET /get_best_node_advised?system_load=
pub async fn get_best_node_advised(
    State(state): State<ApiState>,
    Query(query): Query<BestNodeQuery>,
) -> Response {
    match parse_load(query) {
        Ok(load) => selection_response(state.coordinator.best_node_advised(load).await),
        Err(resp) => resp,
    }
}

/// GET /status
pub async fn status(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(state.coordinator.status_report().await).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct DecisionsQuery {
    pub limit: Option<usize>,
}

/// GET /decisions?limit=
pub async fn recent_decisions(
    State(state): State<ApiState>,
    Query(query): Query<DecisionsQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_DECISION_LIMIT);
    ApiResponse::ok(state.coordinator.recent_decisions(limit).await).into_response()
}

// ── Weights ────────────────────────────────────────────────────

/// GET /weights
pub async fn get_weights(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(state.coordinator.weights().await).into_response()
}

/// PUT /weights
pub async fn put_weights(
    State(state): State<ApiState>,
    body: Result<Json<BTreeMap<String, f64>>, JsonRejection>,
) -> Response {
    let Json(mapping) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_body(rejection),
    };

    let weights = match state.coordinator.load_weights(&mapping).await {
        Ok(weights) => weights,
        Err(e) => return error_response(&e.to_string(), StatusCode::BAD_REQUEST),
    };

    let persisted = match &state.weights_path {
        Some(path) => match save_weights_file(path, &weights) {
            Ok(()) => {
                info!(path = %path.display(), "weights saved");
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to save weights");
                false
            }
        },
        None => false,
    };

    ApiResponse::ok(json!({
        "weights": weights,
        "persisted": persisted,
    }))
    .into_response()
}
