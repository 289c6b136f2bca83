//! Service-level error type for route handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::dispatch::DispatchError;
use crate::upstream::UpstreamError;

/// Errors surfaced to HTTP callers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            ApiError::Dispatch(DispatchError::Timeout(_)) => {
                (StatusCode::GATEWAY_TIMEOUT, "task_timeout")
            }
            // Caller-initiated termination is not a server failure.
            ApiError::Dispatch(e) if e.is_cancellation() => {
                (StatusCode::CONFLICT, "task_cancelled")
            }
            ApiError::Dispatch(_) => (StatusCode::BAD_GATEWAY, "upstream_failure"),
            ApiError::Upstream(UpstreamError::MissingKey) => {
                (StatusCode::UNAUTHORIZED, "missing_api_key")
            }
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_failure"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string()
            }
        }));

        (status, body).into_response()
    }
}
