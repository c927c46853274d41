//! Operator conference-control endpoints.

use crate::AppState;
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use switchboard_engine::ActionError;

/// `POST .../mute` request body.
#[derive(Debug, Deserialize)]
pub struct MuteRequest {
    pub muted: bool,
}

/// `POST .../hold` request body.
#[derive(Debug, Deserialize)]
pub struct HoldRequest {
    pub hold: bool,
}

fn action_error_response(err: ActionError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        ActionError::RoomNotFound(_)
        | ActionError::ConferenceNotActive(_)
        | ActionError::ParticipantNotFound(_, _) => StatusCode::NOT_FOUND,
        ActionError::Provider(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(json!({ "error": err.to_string() })))
}

/// `GET /api/conferences/{name}/participants`
pub async fn list_participants_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.engine.store().participants(&name).await {
        Some(participants) => (
            StatusCode::OK,
            Json(json!({ "conference": name, "participants": participants })),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Conference not found" })),
        ),
    }
}

/// `POST /api/conferences/{name}/participants/{call_sid}/mute`
pub async fn mute_participant_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, call_sid)): Path<(String, String)>,
    Json(request): Json<MuteRequest>,
) -> (StatusCode, Json<Value>) {
    match state
        .engine
        .executor()
        .mute_participant(&name, &call_sid, request.muted)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "call_sid": call_sid, "muted": request.muted })),
        ),
        Err(err) => {
            tracing::warn!(name, call_sid, %err, "mute request failed");
            action_error_response(err)
        }
    }
}

/// `POST /api/conferences/{name}/participants/{call_sid}/hold`
pub async fn hold_participant_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, call_sid)): Path<(String, String)>,
    Json(request): Json<HoldRequest>,
) -> (StatusCode, Json<Value>) {
    match state
        .engine
        .executor()
        .hold_participant(&name, &call_sid, request.hold)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "call_sid": call_sid, "hold": request.hold })),
        ),
        Err(err) => {
            tracing::warn!(name, call_sid, %err, "hold request failed");
            action_error_response(err)
        }
    }
}

/// `DELETE /api/conferences/{name}/participants/{call_sid}`
pub async fn kick_participant_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((name, call_sid)): Path<(String, String)>,
) -> (StatusCode, Json<Value>) {
    match state
        .engine
        .executor()
        .kick_participant(&name, &call_sid)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "call_sid": call_sid, "removed": true })),
        ),
        Err(err) => {
            tracing::warn!(name, call_sid, %err, "kick request failed");
            action_error_response(err)
        }
    }
}
