mod common;

use common::{conference_webhook, engine, wait_until};
use switchboard_engine::WarmTransferParams;
use switchboard_provider::RecordedCall;
use switchboard_types::{Address, ParticipantRole};

fn params(parent_role: ParticipantRole, child_role: ParticipantRole) -> WarmTransferParams {
    WarmTransferParams {
        parent_call_id: "CA-parent".to_string(),
        child_call_id: "CA-child".to_string(),
        parent_name: "alice".to_string(),
        child_name: "bob".to_string(),
        parent_role,
        child_role,
        identity: Some("alice".to_string()),
        transfer_to: None,
    }
}

const ROOM: &str = "alice's-conference-with-bob";

#[tokio::test(start_paused = true)]
async fn warm_transfer_redirects_both_legs_with_table_flags() {
    let (engine, provider, _rx) = engine();

    engine
        .warm_transfer(params(ParticipantRole::Agent, ParticipantRole::Customer))
        .await
        .expect("transfer");

    let recorded = provider.recorded();
    assert!(recorded.iter().any(|c| matches!(
        c,
        RecordedCall::RedirectCall { call_id, url }
            if call_id == "CA-child"
                && url.contains("/voice/join-conference")
                && url.contains("muted=false")
                && url.contains("start_conference_on_enter=false")
                && url.contains("end_conference_on_exit=true")
                && url.contains("role=customer")
    )));
    assert!(recorded.iter().any(|c| matches!(
        c,
        RecordedCall::RedirectCall { call_id, url }
            if call_id == "CA-parent"
                && url.contains("muted=true")
                && url.contains("start_conference_on_enter=true")
                && url.contains("end_conference_on_exit=false")
                && url.contains("role=agent")
    )));

    let room = engine.store().room_snapshot(ROOM).await.expect("room");
    assert_eq!(room.created_by.as_deref(), Some("alice"));

    let parent = &room.participants["CA-parent"];
    assert!(parent.muted && !parent.on_hold);
    let child = &room.participants["CA-child"];
    assert!(!child.muted && !child.on_hold);

    let child_policy = &room.join_policy["CA-child"];
    assert!(child_policy.end_conference_on_exit);
    assert!(!child_policy.start_conference_on_enter);
    let parent_policy = &room.join_policy["CA-parent"];
    assert!(!parent_policy.end_conference_on_exit);
    assert!(parent_policy.start_conference_on_enter);
}

#[tokio::test(start_paused = true)]
async fn customer_parent_parks_both_legs_on_hold() {
    let (engine, _provider, _rx) = engine();

    engine
        .warm_transfer(params(ParticipantRole::Customer, ParticipantRole::Agent))
        .await
        .expect("transfer");

    let room = engine.store().room_snapshot(ROOM).await.expect("room");
    let parent_policy = &room.join_policy["CA-parent"];
    assert!(parent_policy.hold_on_join && !parent_policy.mute_on_join);
    let child_policy = &room.join_policy["CA-child"];
    assert!(child_policy.hold_on_join && child_policy.mute_on_join);
}

#[tokio::test(start_paused = true)]
async fn transfer_stops_parent_recording_first() {
    let (engine, provider, _rx) = engine();
    provider.seed_recording("CA-parent", "RE1");

    engine
        .warm_transfer(params(ParticipantRole::Agent, ParticipantRole::Customer))
        .await
        .expect("transfer");

    let recorded = provider.recorded();
    assert!(recorded.iter().any(|c| matches!(
        c,
        RecordedCall::StopRecording { call_id, recording_sid }
            if call_id == "CA-parent" && recording_sid == "RE1"
    )));
    let room = engine.store().room_snapshot(ROOM).await.unwrap();
    assert_eq!(
        room.join_policy["CA-parent"].initial_recording_sid.as_deref(),
        Some("RE1")
    );
    assert_eq!(room.join_policy["CA-child"].initial_recording_sid, None);
}

#[tokio::test(start_paused = true)]
async fn transfer_falls_back_to_child_recording() {
    let (engine, provider, _rx) = engine();
    provider.seed_recording("CA-child", "RE2");

    engine
        .warm_transfer(params(ParticipantRole::Agent, ParticipantRole::Customer))
        .await
        .expect("transfer");

    let recorded = provider.recorded();
    assert!(recorded.iter().any(|c| matches!(
        c,
        RecordedCall::StopRecording { call_id, recording_sid }
            if call_id == "CA-child" && recording_sid == "RE2"
    )));
    let room = engine.store().room_snapshot(ROOM).await.unwrap();
    assert_eq!(
        room.join_policy["CA-child"].initial_recording_sid.as_deref(),
        Some("RE2")
    );
}

#[tokio::test(start_paused = true)]
async fn initiator_join_dials_the_transfer_target() {
    let (engine, provider, _rx) = engine();
    provider.seed_conference(ROOM, "CF1");
    let mut p = params(ParticipantRole::Agent, ParticipantRole::Customer);
    p.transfer_to = Some(Address::parse("client:agent-2"));

    engine.warm_transfer(p).await.expect("transfer");

    // The parent leg carries the add spec; its join fires the one-shot add.
    engine
        .handle_conference_status(conference_webhook("participant-join", ROOM, Some("CA-parent")))
        .await;
    wait_until("third party dialed", || provider.count("add_participant") == 1).await;

    let recorded = provider.recorded();
    assert!(recorded.iter().any(|c| matches!(
        c,
        RecordedCall::AddParticipant { friendly_name, to, options, .. }
            if friendly_name == ROOM
                && *to == Address::parse("client:agent-2")
                && !options.end_conference_on_exit
    )));

    // The child joining afterwards must not dial a second copy.
    engine
        .handle_conference_status(conference_webhook("participant-join", ROOM, Some("CA-child")))
        .await;
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    assert_eq!(provider.count("add_participant"), 1);
}
