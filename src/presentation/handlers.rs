// HTTP request handlers
use crate::application::deterrent::DeterrentKind;
use crate::infrastructure::chunked_json::stream_from_watch;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// List tracked collar ids
pub async fn list_collars(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.collar_ids())
}

/// Current dashboard snapshot for one collar
pub async fn get_view(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.session(&id) {
        Some(session) => Json(session.view()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Stream dashboard snapshots for one collar as they change
pub async fn stream_view(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    // Check if client accepts Brotli compression
    let compress = headers
        .get("accept-encoding")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.contains("br"))
        .unwrap_or(false);

    match state.session(&id) {
        Some(session) => stream_from_watch(session.watch_view(), compress)
            .await
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Trigger a deterrent action on a collar. Fire-and-forget: the session
/// arms the reset timer and reports progress through its view stream.
pub async fn trigger_deterrent(
    Path((id, kind)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> StatusCode {
    let Some(kind) = DeterrentKind::parse(&kind) else {
        return StatusCode::BAD_REQUEST;
    };

    match state.session(&id) {
        Some(session) => {
            if session.trigger_deterrent(kind).await {
                StatusCode::ACCEPTED
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
        None => StatusCode::NOT_FOUND,
    }
}
