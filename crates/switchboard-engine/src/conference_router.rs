//! Conference-status webhook routing.
//!
//! Mirrors the call router's contract: soft-fails internally, never blocks on
//! the provider, re-entrant against duplicate and out-of-order callbacks.
//! Policy flags armed by the hold/transfer flows fire here as their matching
//! participant events arrive.

use crate::Engine;
use chrono::Utc;
use std::collections::HashSet;
use switchboard_store::ParticipantUpdate;
use switchboard_types::{
    ConferenceEventKind, ConferenceEventPayload, ConferenceStatusEvent, Outbound, ParticipantRole,
    PolicyFlag, RealtimeEvent,
};

pub(crate) async fn handle(engine: &Engine, event: ConferenceStatusEvent) {
    let room = event.friendly_name.clone();
    engine.store.ensure_room(&room).await;
    if let Some(sid) = &event.conference_sid {
        engine.store.set_conference_sid(&room, sid).await;
    }

    match event.kind {
        ConferenceEventKind::ConferenceStart => {
            engine.store.mark_conference_started(&room, Utc::now()).await;
        }
        ConferenceEventKind::ConferenceEnd => {
            engine.store.mark_conference_ended(&room).await;
        }
        ConferenceEventKind::ParticipantJoin => {
            if let Some(call_id) = &event.call_sid {
                engine
                    .store
                    .upsert_participant(
                        &room,
                        call_id,
                        ParticipantUpdate {
                            label: event.participant_label.clone(),
                            muted: event.muted,
                            on_hold: event.hold,
                            role: None,
                        },
                    )
                    .await;
                on_participant_join(engine, &room, call_id).await;
            }
        }
        ConferenceEventKind::ParticipantLeave => {
            if let Some(call_id) = &event.call_sid {
                engine.store.mark_participant_left(&room, call_id).await;
            }
        }
        ConferenceEventKind::ParticipantMute | ConferenceEventKind::ParticipantUnmute => {
            if let Some(call_id) = &event.call_sid {
                let muted = event.kind == ConferenceEventKind::ParticipantMute;
                engine
                    .store
                    .set_participant_muted(&room, call_id, muted)
                    .await;
            }
        }
        ConferenceEventKind::ParticipantHold | ConferenceEventKind::ParticipantUnhold => {
            if let Some(call_id) = &event.call_sid {
                let on_hold = event.kind == ConferenceEventKind::ParticipantHold;
                engine
                    .store
                    .set_participant_hold(&room, call_id, on_hold)
                    .await;
                on_hold_toggled(engine, &room, call_id, on_hold).await;
            }
        }
    }

    broadcast(engine, &event).await;

    tracing::debug!(
        room = event.friendly_name,
        kind = event.kind.as_str(),
        call_id = event.call_sid.as_deref().unwrap_or(""),
        "conference-status event processed"
    );
}

/// Executes the leg's armed join policy: hold with music, greeting redirect,
/// the one-shot third-party add, and the media stream (skipped while the leg
/// is parked on hold).
async fn on_participant_join(engine: &Engine, room: &str, call_id: &str) {
    let Some((_, policy)) = engine.store.policy_for_call(call_id).await else {
        return;
    };
    let joining_held = policy.hold_on_join;

    if engine
        .store
        .consume_policy_flag(call_id, PolicyFlag::HoldOnJoin)
        .await
    {
        engine
            .executor
            .spawn_hold_on_join(room.to_string(), call_id.to_string());
    }

    if engine
        .store
        .consume_policy_flag(call_id, PolicyFlag::PlayGreetingOnJoin)
        .await
    {
        engine
            .executor
            .spawn_play_greeting(room.to_string(), call_id.to_string());
    }

    // Only the leg carrying the add spec is the designated initiator; the
    // claim is one-shot per room.
    if let Some((add_room, spec)) = engine.store.take_add_spec(call_id).await {
        engine.executor.spawn_add_participant(add_room, spec);
    }

    if policy.stream_audio && !joining_held && engine.store.claim_stream_start(call_id).await {
        let label = policy
            .participant_label
            .clone()
            .unwrap_or_else(|| call_id.to_string());
        engine
            .executor
            .spawn_start_stream(call_id.to_string(), label);
    }
}

/// Hold state changed for a leg: pause or resume its media stream, and on a
/// customer going on hold, fire any pending third-party add.
async fn on_hold_toggled(engine: &Engine, room: &str, call_id: &str, on_hold: bool) {
    if let Some((_, policy)) = engine.store.policy_for_call(call_id).await {
        if policy.stream_audio {
            if on_hold {
                engine.executor.spawn_stop_stream(call_id.to_string());
            } else if engine.store.claim_stream_start(call_id).await {
                let label = policy
                    .participant_label
                    .clone()
                    .unwrap_or_else(|| call_id.to_string());
                engine
                    .executor
                    .spawn_start_stream(call_id.to_string(), label);
            }
        }
    }

    if on_hold {
        let is_customer = engine
            .store
            .participants(room)
            .await
            .unwrap_or_default()
            .iter()
            .any(|p| p.call_id == call_id && p.role == Some(ParticipantRole::Customer));
        if is_customer {
            if let Some((add_room, spec)) = engine.store.take_add_spec(call_id).await {
                engine.executor.spawn_add_participant(add_room, spec);
            }
        }
    }
}

/// Fans the event out to a deduplicated set of room keys: the participant
/// label, the callback's operator identity, and the room creator. No
/// resolvable target means a global broadcast.
async fn broadcast(engine: &Engine, event: &ConferenceStatusEvent) {
    let mut rooms = HashSet::new();
    if let Some(label) = &event.participant_label {
        rooms.insert(label.clone());
    }
    if let Some(identity) = &event.identity {
        rooms.insert(identity.clone());
    }
    if let Some(created_by) = engine
        .store
        .room_snapshot(&event.friendly_name)
        .await
        .and_then(|r| r.created_by)
    {
        rooms.insert(created_by);
    }

    engine.publish(Outbound {
        rooms,
        event: RealtimeEvent::ConferenceEvent(ConferenceEventPayload::from(event)),
    });
}
