//! REST endpoints for driving sessions over HTTP.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::debug;

use crate::registry::SessionRegistry;
use crate::session::Mode;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct CoachRouteState {
    pub registry: Arc<SessionRegistry>,
}

/// Build the Axum router with the session routes.
pub fn coach_routes(registry: Arc<SessionRegistry>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/sessions/{id}/messages", post(post_message))
        .route("/api/sessions/{id}/mode", post(post_mode))
        .with_state(CoachRouteState { registry })
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "fit-coach"
    }))
}

async fn create_session(State(state): State<CoachRouteState>) -> impl IntoResponse {
    let (id, replies) = state.registry.create().await;
    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": id, "replies": replies })),
    )
}

async fn get_session(
    State(state): State<CoachRouteState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.registry.view(&id).await {
        Some(view) => (StatusCode::OK, Json(serde_json::json!(view))),
        None => session_not_found(),
    }
}

#[derive(Deserialize)]
struct MessageRequest {
    message: String,
}

async fn post_message(
    State(state): State<CoachRouteState>,
    Path(id): Path<String>,
    Json(body): Json<MessageRequest>,
) -> impl IntoResponse {
    debug!(session = %id, "Message received over HTTP");
    match state.registry.send_message(&id, &body.message).await {
        Some(replies) => (StatusCode::OK, Json(serde_json::json!({ "replies": replies }))),
        None => session_not_found(),
    }
}

fn session_not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "Session not found"})),
    )
}

#[derive(Deserialize)]
struct ModeRequest {
    mode: String,
}

async fn post_mode(
    State(state): State<CoachRouteState>,
    Path(id): Path<String>,
    Json(body): Json<ModeRequest>,
) -> impl IntoResponse {
    let mode = match body.mode.parse::<Mode>() {
        Ok(mode) => mode,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": e})),
            );
        }
    };

    match state.registry.set_mode(&id, mode).await {
        Some(replies) => (
            StatusCode::OK,
            Json(serde_json::json!({ "mode": mode, "replies": replies })),
        ),
        None => session_not_found(),
    }
}
