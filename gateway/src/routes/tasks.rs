//! Task control and status observation routes.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{routing::get, routing::post, Json, Router};
use futures_util::stream::Stream;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;

use super::ai::owner_id;
use crate::AppState;

/// GET /status - server-sent stream of status snapshots.
///
/// The first event carries the current snapshot, so an observer is never
/// left without initial state.
async fn status_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.dispatcher.subscribe();
    let stream = WatchStream::new(rx).map(|snapshot| {
        let event = Event::default()
            .json_data(&snapshot)
            .unwrap_or_else(|_| Event::default().data("{}"));
        Ok(event)
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /snapshot - one-shot status snapshot
async fn snapshot(State(state): State<Arc<AppState>>) -> Json<studio_common::StatusSnapshot> {
    Json(state.dispatcher.current_snapshot())
}

/// POST /:id/cancel
async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
    headers: HeaderMap,
) -> StatusCode {
    state.dispatcher.cancel_task(task_id, &owner_id(&headers));
    StatusCode::NO_CONTENT
}

/// POST /:id/prioritize
async fn prioritize_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
    headers: HeaderMap,
) -> StatusCode {
    state.dispatcher.prioritize_task(task_id, &owner_id(&headers));
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
struct ProgressBody {
    progress: u8,
}

/// POST /:id/progress - report completion progress for an active task
async fn update_progress(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
    Json(body): Json<ProgressBody>,
) -> StatusCode {
    state.dispatcher.update_progress(task_id, body.progress);
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
struct CancelByTagBody {
    tag: String,
}

/// POST /cancel-by-tag
async fn cancel_by_tag(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CancelByTagBody>,
) -> StatusCode {
    state.dispatcher.cancel_by_tag(&body.tag, &owner_id(&headers));
    StatusCode::NO_CONTENT
}

/// POST /cancel-all
async fn cancel_all(State(state): State<Arc<AppState>>, headers: HeaderMap) -> StatusCode {
    state.dispatcher.cancel_all(&owner_id(&headers));
    StatusCode::NO_CONTENT
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(status_stream))
        .route("/snapshot", get(snapshot))
        .route("/:id/cancel", post(cancel_task))
        .route("/:id/prioritize", post(prioritize_task))
        .route("/:id/progress", post(update_progress))
        .route("/cancel-by-tag", post(cancel_by_tag))
        .route("/cancel-all", post(cancel_all))
        .with_state(state)
}
