//! AI work submission routes.
//!
//! Each handler wraps an upstream call in a work function and hands it to
//! the dispatcher; the HTTP response resolves when the task reaches a
//! terminal state. A caller-supplied `x-user-api-key` header moves the
//! task into the private concurrency lane.

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::Value;

use studio_common::{TaskKind, TaskModule, TaskPriority};

use crate::dispatch::{DispatchError, TaskRequest, WorkFn};
use crate::error::ApiError;
use crate::upstream::{ChatPrompt, ImagePrompt, UpstreamError};
use crate::AppState;

/// Header carrying a caller-supplied upstream credential.
pub const USER_KEY_HEADER: &str = "x-user-api-key";
/// Header identifying the submitting owner.
pub const OWNER_HEADER: &str = "x-owner-id";

pub(crate) fn owner_id(headers: &HeaderMap) -> String {
    headers
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous")
        .to_string()
}

fn caller_credential(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Reject before enqueueing when no credential could possibly serve the
/// request, mirroring the provider's 401.
fn require_some_key(state: &AppState, credential: &Option<String>) -> Result<(), ApiError> {
    if credential.is_none() && state.config.upstream.api_key.is_empty() {
        return Err(ApiError::Upstream(UpstreamError::MissingKey));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct AnalyzeBody {
    prompt: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    system_instruction: Option<String>,
    /// "json" requests a JSON object response from the provider.
    #[serde(default)]
    response_format: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    module: Option<TaskModule>,
    #[serde(default)]
    priority: Option<TaskPriority>,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ImageBody {
    prompt: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    aspect_ratio: Option<String>,
    #[serde(default)]
    image_size: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    module: Option<TaskModule>,
    #[serde(default)]
    priority: Option<TaskPriority>,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    metadata: Option<Value>,
}

fn build_request(
    owner: String,
    kind: TaskKind,
    module: TaskModule,
    label: String,
    priority: Option<TaskPriority>,
    tag: Option<String>,
    metadata: Option<Value>,
    own_credential: bool,
) -> TaskRequest {
    let mut request = TaskRequest::new(owner, kind, module, label)
        .with_priority(priority.unwrap_or_default())
        .with_own_credential(own_credential);
    if let Some(tag) = tag {
        request = request.with_tag(tag);
    }
    if let Some(metadata) = metadata {
        request = request.with_metadata(metadata);
    }
    request
}

/// POST /analyze - text analysis via chat completion
async fn analyze(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<AnalyzeBody>,
) -> Result<Json<Value>, ApiError> {
    let credential = caller_credential(&headers);
    require_some_key(&state, &credential)?;

    let request = build_request(
        owner_id(&headers),
        TaskKind::Analysis,
        body.module.unwrap_or(TaskModule::Script),
        body.label.unwrap_or_else(|| "Text analysis".to_string()),
        body.priority,
        body.tag,
        body.metadata,
        credential.is_some(),
    );

    let prompt = ChatPrompt {
        prompt: body.prompt,
        system_instruction: body.system_instruction,
        model: body.model,
        json_response: matches!(body.response_format.as_deref(), Some("json")),
    };

    let upstream = state.upstream.clone();
    let work: WorkFn = Box::new(move |_task_id, _cancel| {
        Box::pin(async move {
            upstream
                .chat(&prompt, credential.as_deref())
                .await
                .map_err(|e| DispatchError::Upstream(e.to_string()))
        })
    });

    let result = state.dispatcher.enqueue(request, work).outcome().await?;
    Ok(Json(result))
}

/// POST /reason - video-prompt reasoning; shorter calls on the fast model
async fn reason(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<AnalyzeBody>,
) -> Result<Json<Value>, ApiError> {
    let credential = caller_credential(&headers);
    require_some_key(&state, &credential)?;

    let request = build_request(
        owner_id(&headers),
        TaskKind::Reasoning,
        body.module.unwrap_or(TaskModule::Storyboard),
        body.label.unwrap_or_else(|| "Prompt reasoning".to_string()),
        body.priority,
        body.tag,
        body.metadata,
        credential.is_some(),
    );

    let prompt = ChatPrompt {
        prompt: body.prompt,
        system_instruction: body.system_instruction,
        model: Some(
            body.model
                .unwrap_or_else(|| state.config.upstream.models.analysis_fast.clone()),
        ),
        json_response: matches!(body.response_format.as_deref(), Some("json")),
    };

    let upstream = state.upstream.clone();
    let work: WorkFn = Box::new(move |_task_id, _cancel| {
        Box::pin(async move {
            upstream
                .chat(&prompt, credential.as_deref())
                .await
                .map_err(|e| DispatchError::Upstream(e.to_string()))
        })
    });

    let result = state.dispatcher.enqueue(request, work).outcome().await?;
    Ok(Json(result))
}

/// POST /generate-image - image generation
async fn generate_image(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ImageBody>,
) -> Result<Json<Value>, ApiError> {
    let credential = caller_credential(&headers);
    require_some_key(&state, &credential)?;

    let request = build_request(
        owner_id(&headers),
        TaskKind::Rendering,
        body.module.unwrap_or(TaskModule::Assets),
        body.label.unwrap_or_else(|| "Image generation".to_string()),
        body.priority,
        body.tag,
        body.metadata,
        credential.is_some(),
    );

    let prompt = ImagePrompt {
        prompt: body.prompt,
        model: body.model,
        aspect_ratio: body.aspect_ratio,
        image_size: body.image_size,
    };

    let upstream = state.upstream.clone();
    let work: WorkFn = Box::new(move |_task_id, _cancel| {
        Box::pin(async move {
            upstream
                .generate_image(&prompt, credential.as_deref())
                .await
                .map_err(|e| DispatchError::Upstream(e.to_string()))
        })
    });

    let result = state.dispatcher.enqueue(request, work).outcome().await?;
    Ok(Json(result))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/reason", post(reason))
        .route("/generate-image", post(generate_image))
        .with_state(state)
}
