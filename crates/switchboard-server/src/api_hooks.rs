//! Provider webhook endpoints.
//!
//! The provider retries undelivered callbacks, so every hook acknowledges
//! with `204 No Content` no matter what the payload contained; malformed
//! payloads are logged and discarded inside the engine. Callbacks arrive as
//! query parameters (GET) or form bodies (POST); the operator `identity`
//! always rides on the query string, even for POSTs.

use crate::AppState;
use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    Form,
};
use serde::Deserialize;
use std::sync::Arc;
use switchboard_types::{CallStatusWebhook, ConferenceStatusWebhook, RecordingStatusWebhook};

/// The query-string half of a POSTed callback.
#[derive(Debug, Default, Deserialize)]
pub struct IdentityQuery {
    pub identity: Option<String>,
}

/// `GET /hooks/call-status`
pub async fn call_status_query(
    Extension(state): Extension<Arc<AppState>>,
    Query(webhook): Query<CallStatusWebhook>,
) -> StatusCode {
    state.engine.handle_call_status(webhook).await;
    StatusCode::NO_CONTENT
}

/// `POST /hooks/call-status`
pub async fn call_status_form(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<IdentityQuery>,
    Form(mut webhook): Form<CallStatusWebhook>,
) -> StatusCode {
    if webhook.identity.is_none() {
        webhook.identity = query.identity;
    }
    state.engine.handle_call_status(webhook).await;
    StatusCode::NO_CONTENT
}

/// `GET /hooks/conference-status`
pub async fn conference_status_query(
    Extension(state): Extension<Arc<AppState>>,
    Query(webhook): Query<ConferenceStatusWebhook>,
) -> StatusCode {
    state.engine.handle_conference_status(webhook).await;
    StatusCode::NO_CONTENT
}

/// `POST /hooks/conference-status`
pub async fn conference_status_form(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<IdentityQuery>,
    Form(mut webhook): Form<ConferenceStatusWebhook>,
) -> StatusCode {
    if webhook.identity.is_none() {
        webhook.identity = query.identity;
    }
    state.engine.handle_conference_status(webhook).await;
    StatusCode::NO_CONTENT
}

/// `GET /hooks/recording-status`
pub async fn recording_status_query(
    Extension(state): Extension<Arc<AppState>>,
    Query(webhook): Query<RecordingStatusWebhook>,
) -> StatusCode {
    state.engine.handle_recording_status(webhook).await;
    StatusCode::NO_CONTENT
}

/// `POST /hooks/recording-status`
pub async fn recording_status_form(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<IdentityQuery>,
    Form(mut webhook): Form<RecordingStatusWebhook>,
) -> StatusCode {
    if webhook.identity.is_none() {
        webhook.identity = query.identity;
    }
    state.engine.handle_recording_status(webhook).await;
    StatusCode::NO_CONTENT
}
