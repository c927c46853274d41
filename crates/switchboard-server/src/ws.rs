//! WebSocket handler, connection management, and realtime fan-out.
//!
//! Operators connect with `GET /ws?identity=...` and only ever receive
//! frames. Room keys in outbound events are operator identities; an identity
//! stays routable while at least one of its sessions is still connected.

use crate::AppState;
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Extension, Query, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use switchboard_types::{Outbound, RealtimeEvent};
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Sessions per identity. An identity may hold several concurrent
/// connections (multiple browser tabs); it disappears from the map only when
/// the last one closes.
type SessionMap = HashMap<String, Vec<(Uuid, mpsc::Sender<String>)>>;

/// Manages active WebSocket connections.
#[derive(Clone, Default)]
pub struct ConnectionManager {
    sessions: Arc<RwLock<SessionMap>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new session for an identity. Returns the unique session ID.
    pub async fn add_session(&self, identity: String, sender: mpsc::Sender<String>) -> Uuid {
        let session_id = Uuid::new_v4();
        self.sessions
            .write()
            .await
            .entry(identity)
            .or_default()
            .push((session_id, sender));
        session_id
    }

    /// Removes a session; the identity key is dropped with its last session.
    pub async fn remove_session(&self, identity: &str, session_id: Uuid) {
        let mut sessions = self.sessions.write().await;
        if let Some(entries) = sessions.get_mut(identity) {
            entries.retain(|(id, _)| *id != session_id);
            if entries.is_empty() {
                sessions.remove(identity);
            }
        }
    }

    /// Currently connected identities, sorted for stable output.
    pub async fn identities(&self) -> Vec<String> {
        let sessions = self.sessions.read().await;
        let mut identities: Vec<String> = sessions.keys().cloned().collect();
        identities.sort();
        identities
    }

    /// Delivers a frame to every session of each targeted identity. The
    /// target set is already deduplicated, so each identity gets the frame
    /// once per session. Identities with no live session are skipped.
    pub async fn publish(&self, rooms: &HashSet<String>, frame: &str) {
        let sessions = self.sessions.read().await;
        for identity in rooms {
            if let Some(entries) = sessions.get(identity) {
                for (_, sender) in entries {
                    if let Err(e) = sender.try_send(frame.to_string()) {
                        tracing::warn!(
                            identity = %identity,
                            "dropping realtime frame for slow consumer: {}",
                            e
                        );
                    }
                }
            }
        }
    }

    /// Delivers a frame to every connected session.
    pub async fn publish_all(&self, frame: &str) {
        let sessions = self.sessions.read().await;
        for (identity, entries) in sessions.iter() {
            for (_, sender) in entries {
                if let Err(e) = sender.try_send(frame.to_string()) {
                    tracing::warn!(
                        identity = %identity,
                        "dropping realtime frame for slow consumer: {}",
                        e
                    );
                }
            }
        }
    }
}

/// Tells everyone who is connected now; sent on every connect and disconnect.
pub async fn broadcast_identities(manager: &ConnectionManager) {
    let identities = manager.identities().await;
    let event = RealtimeEvent::ConnectedIdentities { identities };
    match serde_json::to_string(&event) {
        Ok(frame) => manager.publish_all(&frame).await,
        Err(e) => tracing::error!("failed to serialize connected-identities frame: {}", e),
    }
}

/// Drains the engine's realtime channel into the connection manager. An
/// empty target set means broadcast.
pub async fn run_event_pump(
    mut events: mpsc::UnboundedReceiver<Outbound>,
    manager: ConnectionManager,
) {
    while let Some(outbound) = events.recv().await {
        let frame = match serde_json::to_string(&outbound.event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("failed to serialize realtime event: {}", e);
                continue;
            }
        };
        if outbound.rooms.is_empty() {
            manager.publish_all(&frame).await;
        } else {
            manager.publish(&outbound.rooms, &frame).await;
        }
    }
    tracing::debug!("realtime channel closed, fan-out task exiting");
}

/// Query parameters for the WebSocket connection.
#[derive(Debug, Deserialize)]
pub struct WsConnectParams {
    pub identity: Option<String>,
}

/// WebSocket handler: `GET /ws?identity=...`. A missing or blank identity is
/// rejected before the upgrade.
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ws: WebSocketUpgrade,
    Query(params): Query<WsConnectParams>,
) -> impl IntoResponse {
    let Some(identity) = params.identity.filter(|s| !s.trim().is_empty()) else {
        tracing::warn!("websocket connect missing identity");
        return StatusCode::BAD_REQUEST.into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

/// Handles the WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, identity: String) {
    let (mut sender, mut receiver) = socket.split();

    // Bounded channel per session to prevent unbounded memory growth from
    // slow consumers; beyond 256 queued frames the client is too slow and
    // frames are dropped.
    let (tx, mut rx) = mpsc::channel::<String>(256);

    let session_id = state.connections.add_session(identity.clone(), tx).await;
    tracing::info!(identity = %identity, %session_id, "websocket session opened");

    broadcast_identities(&state.connections).await;

    // Forward queued frames to the socket.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(WsMessage::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // Operators only listen; drain the read side until the peer goes away.
    while let Some(Ok(msg)) = receiver.next().await {
        if let WsMessage::Close(_) = msg {
            break;
        }
    }

    state
        .connections
        .remove_session(&identity, session_id)
        .await;
    send_task.abort();
    broadcast_identities(&state.connections).await;
    tracing::info!(identity = %identity, %session_id, "websocket session closed");
}

/// `GET /api/identities` — connected operator identities.
pub async fn identities_handler(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "identities": state.connections.identities().await }))
}
