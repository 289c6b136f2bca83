use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use http::StatusCode;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use studio_gateway::{routes, AppState, Config};

fn test_state(base_url: &str, api_key: &str) -> Arc<AppState> {
    let mut config = Config::default();
    config.upstream.base_url = base_url.to_string();
    config.upstream.api_key = api_key.to_string();
    Arc::new(AppState::new(config))
}

fn test_app(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/ai", routes::ai::router(state.clone()))
        .nest("/api/tasks", routes::tasks::router(state))
}

async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = http::Request::builder()
        .method(http::Method::POST)
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("x-owner-id", "test-owner")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let app = test_app(test_state("http://localhost:9", "key"));

    let request = http::Request::builder()
        .uri("/health")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_analyze_returns_upstream_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "scene breakdown" } }]
        })))
        .mount(&server)
        .await;

    let app = test_app(test_state(&server.uri(), "gateway-key"));
    let (status, body) = post_json(
        &app,
        "/api/ai/analyze",
        json!({ "prompt": "analyze scene 1" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("scene breakdown"));
}

#[tokio::test]
async fn test_analyze_without_any_key_is_unauthorized() {
    let app = test_app(test_state("http://localhost:9", ""));
    let (status, body) = post_json(&app, "/api/ai/analyze", json!({ "prompt": "p" })).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["type"], "missing_api_key");
}

#[tokio::test]
async fn test_analyze_upstream_error_maps_to_bad_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let app = test_app(test_state(&server.uri(), "gateway-key"));
    let (status, body) = post_json(&app, "/api/ai/analyze", json!({ "prompt": "p" })).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["type"], "upstream_failure");
}

#[tokio::test]
async fn test_generate_image_returns_data_array() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/images/edits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "url": "https://img.example/1.png" }]
        })))
        .mount(&server)
        .await;

    let app = test_app(test_state(&server.uri(), "gateway-key"));
    let (status, body) = post_json(
        &app,
        "/api/ai/generate-image",
        json!({ "prompt": "a storyboard frame", "aspect_ratio": "16:9" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["url"], "https://img.example/1.png");
}

#[tokio::test]
async fn test_snapshot_starts_empty() {
    let app = test_app(test_state("http://localhost:9", "key"));

    let (status, body) = get_json(&app, "/api/tasks/snapshot").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["shared_stats"]["total_queued"], 0);
    assert_eq!(body["active_tasks"], json!([]));
}

#[tokio::test]
async fn test_update_progress_reflected_in_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(500))
                .set_body_json(json!({
                    "choices": [{ "message": { "content": "ok" } }]
                })),
        )
        .mount(&server)
        .await;

    let app = test_app(test_state(&server.uri(), "gateway-key"));
    let submit = {
        let app = app.clone();
        tokio::spawn(
            async move { post_json(&app, "/api/ai/analyze", json!({ "prompt": "p" })).await },
        )
    };

    // Wait for the task to reach the active set.
    let task_id = loop {
        let (_, body) = get_json(&app, "/api/tasks/snapshot").await;
        if let Some(task) = body["active_tasks"].get(0) {
            break task["id"].as_str().unwrap().to_string();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };

    let (status, _) = post_json(
        &app,
        &format!("/api/tasks/{task_id}/progress"),
        json!({ "progress": 42 }),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = get_json(&app, "/api/tasks/snapshot").await;
    assert_eq!(body["active_tasks"][0]["progress"], 42);

    let (status, _) = submit.await.unwrap();
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_progress_on_unknown_task_is_silently_ignored() {
    let app = test_app(test_state("http://localhost:9", "key"));
    let (status, _) = post_json(
        &app,
        &format!("/api/tasks/{}/progress", uuid::Uuid::new_v4()),
        json!({ "progress": 10 }),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_cancel_unknown_task_is_silently_ignored() {
    let app = test_app(test_state("http://localhost:9", "key"));
    let (status, _) = post_json(
        &app,
        &format!("/api/tasks/{}/cancel", uuid::Uuid::new_v4()),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
