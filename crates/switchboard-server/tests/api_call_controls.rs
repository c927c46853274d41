mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::test_state;
use serde_json::{json, Value};
use switchboard_provider::RecordedCall;
use switchboard_server::app;
use switchboard_store::ParticipantUpdate;
use tower::ServiceExt;

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_check_returns_ok() {
    let (state, _provider, _events) = test_state();
    let app = app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn hold_rejects_missing_sids() {
    let (state, _provider, _events) = test_state();
    let app = app(state);

    let response = app
        .oneshot(post_json(
            "/api/calls/hold",
            json!({ "child_call_sid": "CA1" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Missing call SID(s)");
}

#[tokio::test]
async fn hold_parks_child_and_reports_success() {
    let (state, provider, _events) = test_state();
    let app = app(state);

    let response = app
        .oneshot(post_json(
            "/api/calls/hold",
            json!({
                "child_call_sid": "CA1",
                "parent_call_sid": "CA2",
                "parent_target": "client:alice"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Child placed in conference; parent dropped");

    let recorded = provider.recorded();
    assert!(recorded.iter().any(|c| matches!(
        c,
        RecordedCall::RedirectCall { call_id, url }
            if call_id == "CA1" && url.contains("conference_name=CallRoom_CA2")
    )));
    assert!(recorded
        .iter()
        .any(|c| matches!(c, RecordedCall::CompleteCall { call_id } if call_id == "CA2")));
}

#[tokio::test]
async fn unhold_without_cached_address_is_bad_request() {
    let (state, _provider, _events) = test_state();
    let app = app(state);

    let response = app
        .oneshot(post_json(
            "/api/calls/unhold",
            json!({ "parent_call_sid": "CA2" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Parent number not found for given SID");
}

#[tokio::test]
async fn warm_transfer_rejects_missing_names() {
    let (state, _provider, _events) = test_state();
    let app = app(state);

    let response = app
        .oneshot(post_json(
            "/api/transfer/warm",
            json!({
                "parent_call_sid": "CA-parent",
                "child_call_sid": "CA-child"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Missing name(s)");
}

#[tokio::test]
async fn warm_transfer_moves_both_legs() {
    let (state, provider, _events) = test_state();
    let engine = state.engine.clone();
    let app = app(state);

    let response = app
        .oneshot(post_json(
            "/api/transfer/warm",
            json!({
                "parent_call_sid": "CA-parent",
                "child_call_sid": "CA-child",
                "parent_name": "alice",
                "child_name": "bob",
                "parent_role": "agent",
                "child_role": "customer",
                "identity": "alice"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        provider
            .recorded()
            .iter()
            .filter(|c| matches!(c, RecordedCall::RedirectCall { .. }))
            .count(),
        2
    );
    let room = engine
        .store()
        .room_snapshot("alice's-conference-with-bob")
        .await
        .expect("transfer room created");
    assert_eq!(room.created_by.as_deref(), Some("alice"));
}

#[tokio::test]
async fn participants_of_unknown_conference_is_not_found() {
    let (state, _provider, _events) = test_state();
    let app = app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/conferences/no-such-room/participants")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Conference not found");
}

#[tokio::test]
async fn participants_listing_includes_state() {
    let (state, _provider, _events) = test_state();
    let engine = state.engine.clone();
    let app = app(state);

    engine
        .store()
        .upsert_participant(
            "CallRoom_CA2",
            "CA1",
            ParticipantUpdate {
                label: Some("bob".to_string()),
                muted: Some(true),
                ..Default::default()
            },
        )
        .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/conferences/CallRoom_CA2/participants")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["conference"], "CallRoom_CA2");
    assert_eq!(json["participants"][0]["call_id"], "CA1");
    assert_eq!(json["participants"][0]["label"], "bob");
    assert_eq!(json["participants"][0]["muted"], true);
}

#[tokio::test]
async fn mute_in_unknown_room_is_not_found() {
    let (state, _provider, _events) = test_state();
    let app = app(state);

    let response = app
        .oneshot(post_json(
            "/api/conferences/no-such-room/participants/CA1/mute",
            json!({ "muted": true }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mute_updates_provider_and_store() {
    let (state, provider, _events) = test_state();
    let engine = state.engine.clone();
    let app = app(state);

    engine.store().ensure_room("CallRoom_CA2").await;
    engine.store().set_conference_sid("CallRoom_CA2", "CF1").await;
    engine
        .store()
        .upsert_participant("CallRoom_CA2", "CA1", ParticipantUpdate::default())
        .await;

    let response = app
        .oneshot(post_json(
            "/api/conferences/CallRoom_CA2/participants/CA1/mute",
            json!({ "muted": true }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(provider.count("update_participant"), 1);
    let participants = engine.store().participants("CallRoom_CA2").await.unwrap();
    assert!(participants[0].muted);
}

#[tokio::test]
async fn kick_removes_participant() {
    let (state, provider, _events) = test_state();
    let engine = state.engine.clone();
    let app = app(state);

    engine.store().ensure_room("CallRoom_CA2").await;
    engine.store().set_conference_sid("CallRoom_CA2", "CF1").await;
    engine
        .store()
        .upsert_participant("CallRoom_CA2", "CA1", ParticipantUpdate::default())
        .await;

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/conferences/CallRoom_CA2/participants/CA1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(provider.count("remove_participant"), 1);
    let participants = engine.store().participants("CallRoom_CA2").await.unwrap();
    assert!(participants[0].left);
}

#[tokio::test]
async fn identities_endpoint_reports_connected_operators() {
    let (state, _provider, _events) = test_state();
    let connections = state.connections.clone();
    let app = app(state);

    let (tx, _rx) = tokio::sync::mpsc::channel(8);
    connections.add_session("alice".to_string(), tx).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/identities")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["identities"], json!(["alice"]));
}
