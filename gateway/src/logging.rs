use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::routes::ai::OWNER_HEADER;

/// Middleware that logs HTTP requests at INFO level, tagged with the
/// submitting owner when the header is present.
pub async fn request_logger(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let owner = request
        .headers()
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous")
        .to_string();

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        path = %path,
        owner = %owner,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        "HTTP request"
    );

    response
}
