use axum::{routing::get, Json, Router};
use serde_json::json;

/// GET /health - liveness probe
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router() -> Router {
    Router::new().route("/health", get(health))
}
