mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{drain, test_state};
use switchboard_server::app;
use tower::ServiceExt;

#[tokio::test]
async fn malformed_call_status_is_still_acknowledged() {
    let (state, _provider, mut events) = test_state();
    let app = app(state);

    // No CallSid at all; the provider must still get its 204.
    let response = app
        .oneshot(
            Request::builder()
                .uri("/hooks/call-status?CallStatus=ringing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn call_status_form_merges_identity_from_query() {
    let (state, _provider, mut events) = test_state();
    let app = app(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/hooks/call-status?identity=op")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("CallSid=CA1&CallStatus=ringing"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let frames = drain(&mut events);
    assert!(!frames.is_empty(), "identity-tagged event produces a frame");
    assert!(frames.iter().all(|f| f.rooms.contains("op")));
}

#[tokio::test]
async fn conference_status_form_is_tracked_in_store() {
    let (state, _provider, _events) = test_state();
    let engine = state.engine.clone();
    let app = app(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/hooks/conference-status")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from(
                    "StatusCallbackEvent=conference-start&FriendlyName=CallRoom_CA1",
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let room = engine
        .store()
        .room_snapshot("CallRoom_CA1")
        .await
        .expect("room created by callback");
    assert!(room.started_at.is_some());
    assert!(!room.ended);
}

#[tokio::test]
async fn conference_status_without_name_is_discarded() {
    let (state, _provider, mut events) = test_state();
    let app = app(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/hooks/conference-status")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("StatusCallbackEvent=participant-join"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn recording_status_get_broadcasts_globally() {
    let (state, _provider, mut events) = test_state();
    let app = app(state);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/hooks/recording-status?RecordingSid=RE1&CallSid=CA1&RecordingStatus=completed")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let frames = drain(&mut events);
    assert_eq!(frames.len(), 1);
    assert!(frames[0].rooms.is_empty(), "no identity means broadcast");
}
