//! Chat completions endpoint.

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use inferops_router::{ChatRequest, RouteError};

use crate::ApiState;
use crate::handlers::error_response;

/// POST /api/v1/chat/completions
///
/// Responds with `text/event-stream`: a `node_assigned` event, the raw
/// upstream bytes, and one inline error event if the node fails. When no
/// node can be locked the response is a 503 JSON envelope instead.
pub async fn chat_completions(
    State(state): State<ApiState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "rejected chat payload");
            return error_response(&rejection.body_text(), StatusCode::BAD_REQUEST).into_response();
        }
    };
    if let Err(msg) = request.validate() {
        return error_response(&msg, StatusCode::BAD_REQUEST).into_response();
    }

    match state.router.open(request).await {
        Ok(session) => {
            debug!(node = session.node_name(), "chat session opened");
            (
                [
                    (CONTENT_TYPE, "text/event-stream"),
                    (CACHE_CONTROL, "no-cache"),
                ],
                Body::from_stream(session.into_stream()),
            )
                .into_response()
        }
        Err(e @ RouteError::NoNodeAvailable) => {
            error_response(&e.to_string(), StatusCode::SERVICE_UNAVAILABLE).into_response()
        }
        Err(e) => {
            warn!(error = %e, "chat session failed to start");
            error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}
