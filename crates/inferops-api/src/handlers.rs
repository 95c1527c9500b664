//! REST API handlers.
//!
//! Read handlers copy out of `StateStore` and return JSON envelopes.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::{info, warn};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
pub(crate) struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    pub(crate) fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }

    pub(crate) fn failed(data: T, msg: &str) -> Json<Self> {
        Json(Self {
            success: false,
            data: Some(data),
            error: Some(msg.to_string()),
        })
    }
}

pub(crate) fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

// ── Monitoring ─────────────────────────────────────────────────

/// GET /api/v1/status/all
pub async fn status_all(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.store.snapshot_all())
}

/// GET /api/v1/alerts
pub async fn list_alerts(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.store.get_alerts())
}

/// GET /api/v1/models
pub async fn list_models(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.store.available_models())
}

// ── Admin ──────────────────────────────────────────────────────

/// POST /api/v1/unlock/all
pub async fn unlock_all(State(state): State<ApiState>) -> impl IntoResponse {
    let report = state.locks.unlock_all(&state.nodes).await;
    if report.all_succeeded() {
        info!(nodes = report.unlocked.len(), "all nodes unlocked");
        ApiResponse::ok(report).into_response()
    } else {
        warn!(failed = ?report.failed, "bulk unlock partially failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiResponse::failed(report, "failed to unlock some nodes"),
        )
            .into_response()
    }
}

// ── Metrics ────────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = crate::prometheus::render_prometheus(
        &state.store.snapshot_all(),
        &state.store.get_alerts(),
    );
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
