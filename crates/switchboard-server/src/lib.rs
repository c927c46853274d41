//! Switchboard server library logic.

pub mod api_calls;
pub mod api_conferences;
pub mod api_hooks;
pub mod config;
pub mod ws;

use axum::{
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use switchboard_engine::Engine;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Orchestration engine; owns the store and the provider client.
    pub engine: Engine,
    /// Connection manager for WebSockets.
    pub connections: ws::ConnectionManager,
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/hooks/call-status",
            get(api_hooks::call_status_query).post(api_hooks::call_status_form),
        )
        .route(
            "/hooks/conference-status",
            get(api_hooks::conference_status_query).post(api_hooks::conference_status_form),
        )
        .route(
            "/hooks/recording-status",
            get(api_hooks::recording_status_query).post(api_hooks::recording_status_form),
        )
        .route("/api/calls/hold", post(api_calls::hold_handler))
        .route("/api/calls/unhold", post(api_calls::unhold_handler))
        .route("/api/transfer/warm", post(api_calls::warm_transfer_handler))
        .route(
            "/api/conferences/{name}/participants",
            get(api_conferences::list_participants_handler),
        )
        .route(
            "/api/conferences/{name}/participants/{callSid}/mute",
            post(api_conferences::mute_participant_handler),
        )
        .route(
            "/api/conferences/{name}/participants/{callSid}/hold",
            post(api_conferences::hold_participant_handler),
        )
        .route(
            "/api/conferences/{name}/participants/{callSid}",
            delete(api_conferences::kick_participant_handler),
        )
        .route("/api/identities", get(ws::identities_handler))
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
