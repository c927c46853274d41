mod common;

use common::{call_webhook, conference_webhook, drain, engine, wait_until};
use switchboard_provider::RecordedCall;
use switchboard_store::ParticipantUpdate;
use switchboard_types::{CallJoinPolicy, ParticipantRole, RealtimeEvent};

fn ring_duration_frames(frames: &[switchboard_types::Outbound]) -> usize {
    frames
        .iter()
        .filter(|f| match &f.event {
            RealtimeEvent::CallEvent(p) => p.kind == Some("ring_duration"),
            _ => false,
        })
        .count()
}

#[tokio::test(start_paused = true)]
async fn ring_duration_fires_once_even_when_terminal_event_repeats() {
    let (engine, _provider, mut rx) = engine();

    engine
        .handle_call_status(call_webhook("CA1", None, "ringing", Some("op")))
        .await;
    engine
        .handle_call_status(call_webhook("CA1", None, "completed", Some("op")))
        .await;
    let frames = drain(&mut rx);
    assert_eq!(ring_duration_frames(&frames), 1);

    // Replayed terminal event: status frame goes out again, the ring
    // duration does not.
    engine
        .handle_call_status(call_webhook("CA1", None, "completed", Some("op")))
        .await;
    let frames = drain(&mut rx);
    assert_eq!(ring_duration_frames(&frames), 0);
}

#[tokio::test(start_paused = true)]
async fn duplicate_ringing_keeps_first_timestamp() {
    let (engine, _provider, _rx) = engine();

    engine
        .handle_call_status(call_webhook("CA1", None, "ringing", None))
        .await;
    let first = engine.store().leg_snapshot("CA1").await.unwrap().ringing_at;

    tokio::time::advance(std::time::Duration::from_secs(3)).await;
    engine
        .handle_call_status(call_webhook("CA1", None, "ringing", None))
        .await;
    let second = engine.store().leg_snapshot("CA1").await.unwrap().ringing_at;
    assert_eq!(first, second);
}

#[tokio::test(start_paused = true)]
async fn linkage_notices_emit_once_per_leg() {
    let (engine, _provider, mut rx) = engine();

    // A child callback arrives before any parent callback: it claims both
    // the parent's and its own notice.
    engine
        .handle_call_status(call_webhook("CA-child", Some("CA-parent"), "ringing", Some("op")))
        .await;
    let frames = drain(&mut rx);
    let kinds: Vec<_> = frames
        .iter()
        .filter_map(|f| match &f.event {
            RealtimeEvent::CallEvent(p) => p.kind,
            _ => None,
        })
        .collect();
    assert!(kinds.contains(&"parent_call_sid"));
    assert!(kinds.contains(&"child_call_sid"));

    // The parent's own later callback finds its notice already claimed.
    engine
        .handle_call_status(call_webhook("CA-parent", None, "ringing", Some("op")))
        .await;
    let frames = drain(&mut rx);
    let kinds: Vec<_> = frames
        .iter()
        .filter_map(|f| match &f.event {
            RealtimeEvent::CallEvent(p) => p.kind,
            _ => None,
        })
        .collect();
    assert!(!kinds.contains(&"parent_call_sid"));
}

#[tokio::test(start_paused = true)]
async fn events_without_identity_produce_no_frames() {
    let (engine, _provider, mut rx) = engine();

    engine
        .handle_call_status(call_webhook("CA1", None, "ringing", None))
        .await;
    engine
        .handle_call_status(call_webhook("CA1", None, "completed", None))
        .await;
    assert!(drain(&mut rx).is_empty());
    // The leg itself is still tracked.
    assert!(engine.store().leg_snapshot("CA1").await.is_some());
}

#[tokio::test(start_paused = true)]
async fn malformed_payload_is_dropped() {
    let (engine, _provider, mut rx) = engine();
    // No CallSid at all.
    engine
        .handle_call_status(switchboard_types::CallStatusWebhook {
            call_status: Some("ringing".to_string()),
            identity: Some("op".to_string()),
            ..Default::default()
        })
        .await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn answer_executes_sync_kick_and_stream_policy() {
    let (engine, provider, _rx) = engine();
    let room = "alice's-conference-with-bob";

    engine.store().ensure_room(room).await;
    engine.store().set_conference_sid(room, "CF1").await;
    engine
        .store()
        .upsert_participant(
            room,
            "CA-bot",
            ParticipantUpdate {
                role: Some(ParticipantRole::Bot),
                ..Default::default()
            },
        )
        .await;
    engine
        .store()
        .set_join_policy(
            room,
            "CA-agent2",
            CallJoinPolicy {
                sync_participant_on_answer: true,
                kick_bot_on_answer: true,
                stream_audio: true,
                participant_label: Some("agent-2".to_string()),
                participant_role: Some(ParticipantRole::Agent),
                ..Default::default()
            },
        )
        .await;

    engine
        .handle_call_status(call_webhook("CA-agent2", None, "in-progress", Some("op")))
        .await;

    wait_until("bot kicked and stream started", || {
        provider.count("remove_participant") == 1 && provider.count("start_media_stream") == 1
    })
    .await;

    let participants = engine.store().participants(room).await.unwrap();
    let agent = participants
        .iter()
        .find(|p| p.call_id == "CA-agent2")
        .expect("agent participant synced");
    assert!(agent.muted);
    assert!(!agent.on_hold);
    let bot = participants.iter().find(|p| p.call_id == "CA-bot").unwrap();
    assert!(bot.left);

    // Duplicate answer event: all three actions are one-shot.
    engine
        .handle_call_status(call_webhook("CA-agent2", None, "in-progress", Some("op")))
        .await;
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    assert_eq!(provider.count("remove_participant"), 1);
    assert_eq!(provider.count("start_media_stream"), 1);
}

#[tokio::test(start_paused = true)]
async fn abandoned_third_party_recovers_waiting_peers() {
    let (engine, provider, _rx) = engine();
    let room = "alice's-conference-with-bob";

    engine.store().ensure_room(room).await;
    engine.store().set_conference_sid(room, "CF1").await;
    engine
        .store()
        .upsert_participant(
            room,
            "CA-customer",
            ParticipantUpdate {
                on_hold: Some(true),
                muted: Some(true),
                role: Some(ParticipantRole::Customer),
                ..Default::default()
            },
        )
        .await;
    engine
        .store()
        .set_join_policy(
            room,
            "CA-agent2",
            CallJoinPolicy {
                recover_peers_on_abandon: true,
                ..Default::default()
            },
        )
        .await;

    engine
        .handle_call_status(call_webhook("CA-agent2", None, "no-answer", None))
        .await;

    wait_until("customer recovered", || {
        provider.count("update_participant") == 1
    })
    .await;
    let recorded = provider.recorded();
    assert!(recorded.iter().any(|c| matches!(
        c,
        RecordedCall::UpdateParticipant { call_id, control, .. }
            if call_id == "CA-customer"
                && control.hold == Some(false)
                && control.muted == Some(false)
    )));

    let participants = engine.store().participants(room).await.unwrap();
    let customer = participants
        .iter()
        .find(|p| p.call_id == "CA-customer")
        .unwrap();
    assert!(!customer.on_hold);
    assert!(!customer.muted);
}

#[tokio::test(start_paused = true)]
async fn conference_end_after_answer_suppresses_kick() {
    let (engine, provider, _rx) = engine();
    let room = "gone-room";

    engine.store().ensure_room(room).await;
    engine
        .store()
        .set_join_policy(
            room,
            "CA1",
            CallJoinPolicy {
                kick_bot_on_answer: true,
                ..Default::default()
            },
        )
        .await;
    engine
        .handle_conference_status(conference_webhook("conference-end", room, None))
        .await;

    engine
        .handle_call_status(call_webhook("CA1", None, "in-progress", None))
        .await;
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    assert_eq!(provider.count("remove_participant"), 0);
}
