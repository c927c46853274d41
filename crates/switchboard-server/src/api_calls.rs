//! Operator call-control endpoints: hold, unhold, warm transfer.

use crate::AppState;
use axum::{extract::Extension, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use switchboard_engine::{FlowError, WarmTransferParams};
use switchboard_types::{Address, ParticipantRole};

/// `POST /api/calls/hold` request body.
#[derive(Debug, Deserialize)]
pub struct HoldRequest {
    pub child_call_sid: Option<String>,
    pub parent_call_sid: Option<String>,
    /// Explicit redial address; inferred from call history when absent.
    pub parent_target: Option<String>,
}

/// `POST /api/calls/unhold` request body.
#[derive(Debug, Deserialize)]
pub struct UnholdRequest {
    pub parent_call_sid: Option<String>,
}

/// `POST /api/transfer/warm` request body.
#[derive(Debug, Deserialize)]
pub struct WarmTransferRequest {
    pub parent_call_sid: Option<String>,
    pub child_call_sid: Option<String>,
    pub parent_name: Option<String>,
    pub child_name: Option<String>,
    pub parent_role: Option<String>,
    pub child_role: Option<String>,
    pub identity: Option<String>,
    /// Third party to dial in once the initiator has joined.
    pub transfer_to: Option<String>,
}

fn required(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.trim().is_empty())
}

fn flow_error_response(err: FlowError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        FlowError::MissingDialTarget => StatusCode::BAD_REQUEST,
        FlowError::ConferenceNotFound => StatusCode::NOT_FOUND,
        FlowError::Provider(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(json!({ "error": err.to_string() })))
}

/// `POST /api/calls/hold` — parks the child leg and drops the parent.
pub async fn hold_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<HoldRequest>,
) -> (StatusCode, Json<Value>) {
    let (Some(child), Some(parent)) = (
        required(request.child_call_sid),
        required(request.parent_call_sid),
    ) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing call SID(s)" })),
        );
    };

    let target = request.parent_target.as_deref().map(Address::parse);
    match state.engine.hold_call(&child, &parent, target).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Child placed in conference; parent dropped" })),
        ),
        Err(err) => {
            tracing::error!(child, parent, %err, "hold flow failed");
            flow_error_response(err)
        }
    }
}

/// `POST /api/calls/unhold` — dials the held parent back in.
pub async fn unhold_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<UnholdRequest>,
) -> (StatusCode, Json<Value>) {
    let Some(parent) = required(request.parent_call_sid) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing call SID(s)" })),
        );
    };

    match state.engine.unhold_call(&parent).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Parent re-dialed into conference" })),
        ),
        Err(err) => {
            tracing::error!(parent, %err, "unhold flow failed");
            flow_error_response(err)
        }
    }
}

/// `POST /api/transfer/warm` — moves both legs into a transfer conference.
pub async fn warm_transfer_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<WarmTransferRequest>,
) -> (StatusCode, Json<Value>) {
    let (Some(parent_call_id), Some(child_call_id)) = (
        required(request.parent_call_sid),
        required(request.child_call_sid),
    ) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing call SID(s)" })),
        );
    };
    let (Some(parent_name), Some(child_name)) =
        (required(request.parent_name), required(request.child_name))
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing name(s)" })),
        );
    };

    // Role strings the UI doesn't send (or sends unrecognized) fall back to
    // the common agent-to-customer handoff.
    let parent_role = request
        .parent_role
        .as_deref()
        .and_then(ParticipantRole::parse)
        .unwrap_or(ParticipantRole::Agent);
    let child_role = request
        .child_role
        .as_deref()
        .and_then(ParticipantRole::parse)
        .unwrap_or(ParticipantRole::Customer);

    let params = WarmTransferParams {
        parent_call_id,
        child_call_id,
        parent_name,
        child_name,
        parent_role,
        child_role,
        identity: request.identity,
        transfer_to: request.transfer_to.as_deref().map(Address::parse),
    };

    match state.engine.warm_transfer(params).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Warm transfer started; both legs in conference" })),
        ),
        Err(err) => {
            tracing::error!(%err, "warm transfer flow failed");
            flow_error_response(err)
        }
    }
}
