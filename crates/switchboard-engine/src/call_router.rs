//! Call-status webhook routing.
//!
//! The handler never errors toward the webhook layer and never awaits a
//! provider call inline. Out-of-order and duplicate delivery is the normal
//! case: every transition applies only when its precondition holds, and every
//! notification with once-only semantics is guarded by a store claim.

use crate::Engine;
use chrono::Utc;
use switchboard_store::CallEventRecord;
use switchboard_types::{
    CallEventPayload, CallStatus, CallStatusEvent, LegRole, Outbound, PolicyFlag, RealtimeEvent,
};
use switchboard_store::ParticipantUpdate;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) async fn handle(engine: &Engine, event: CallStatusEvent) {
    let now = Utc::now();
    let role = engine
        .store
        .upsert_leg(&event.call_id, event.parent_call_id.as_deref())
        .await;

    emit_link_notices(engine, &event, role).await;

    engine
        .store
        .append_event(
            &event.call_id,
            CallEventRecord {
                status: event.status,
                from: event.from.clone(),
                to: event.to.clone(),
                timestamp: now,
                duration_secs: event.duration_secs,
            },
        )
        .await;

    match event.status {
        CallStatus::Initiated => {}
        CallStatus::Ringing => {
            engine.store.mark_ringing(&event.call_id, now).await;
        }
        CallStatus::InProgress => {
            engine.store.mark_answered(&event.call_id, now).await;
            on_answered(engine, &event.call_id).await;
        }
        CallStatus::Completed | CallStatus::Failed => {
            engine.store.mark_ended(&event.call_id, now).await;
        }
        CallStatus::NoAnswer | CallStatus::Busy => {
            on_abandoned(engine, &event.call_id).await;
            engine.store.mark_ended(&event.call_id, now).await;
        }
    }

    // Status updates and the ring-duration notice only go out when the
    // callback carries an operator identity to address them to.
    if let Some(identity) = event.identity.clone() {
        engine.publish(Outbound::to_room(
            identity.clone(),
            RealtimeEvent::CallEvent(CallEventPayload {
                sid: event.call_id.clone(),
                parent_sid: event.parent_call_id.clone(),
                leg: role,
                status: Some(event.status.as_str().to_string()),
                from: event.from.as_ref().map(ToString::to_string),
                to: event.to.as_ref().map(ToString::to_string),
                timestamp: now.format(TIMESTAMP_FORMAT).to_string(),
                note: Some(status_note(role, event.status, event.duration_secs)),
                kind: None,
            }),
        ));

        if let Some(secs) = engine.store.take_ring_duration(&event.call_id).await {
            engine.publish(Outbound::to_room(
                identity,
                RealtimeEvent::CallEvent(CallEventPayload {
                    sid: event.call_id.clone(),
                    parent_sid: event.parent_call_id.clone(),
                    leg: role,
                    status: None,
                    from: None,
                    to: None,
                    timestamp: now.format(TIMESTAMP_FORMAT).to_string(),
                    note: Some(format!(
                        "{} call rang for {secs} seconds",
                        role.label()
                    )),
                    kind: Some("ring_duration"),
                }),
            ));
        }
    }

    tracing::debug!(
        call_id = event.call_id,
        status = event.status.as_str(),
        "call-status event processed"
    );
}

/// One-time parent/child linkage notices. A child callback also claims the
/// parent's notice, since the parent's own callbacks may lag behind.
async fn emit_link_notices(engine: &Engine, event: &CallStatusEvent, role: LegRole) {
    let Some(identity) = event.identity.clone() else {
        return;
    };
    let now = Utc::now().format(TIMESTAMP_FORMAT).to_string();

    let link_payload = |sid: String, parent_sid: Option<String>, leg, kind| {
        RealtimeEvent::CallEvent(CallEventPayload {
            sid,
            parent_sid,
            leg,
            status: None,
            from: None,
            to: None,
            timestamp: now.clone(),
            note: None,
            kind: Some(kind),
        })
    };

    match role {
        LegRole::Parent => {
            if engine.store.claim_link_notice(&event.call_id).await {
                engine.publish(Outbound::to_room(
                    identity,
                    link_payload(event.call_id.clone(), None, LegRole::Parent, "parent_call_sid"),
                ));
            }
        }
        LegRole::Child => {
            if let Some(parent_id) = &event.parent_call_id {
                if engine.store.claim_link_notice(parent_id).await {
                    engine.publish(Outbound::to_room(
                        identity.clone(),
                        link_payload(parent_id.clone(), None, LegRole::Parent, "parent_call_sid"),
                    ));
                }
            }
            if engine.store.claim_link_notice(&event.call_id).await {
                engine.publish(Outbound::to_room(
                    identity,
                    link_payload(
                        event.call_id.clone(),
                        event.parent_call_id.clone(),
                        LegRole::Child,
                        "child_call_sid",
                    ),
                ));
            }
        }
    }
}

/// Policy-driven side effects once a leg answers: re-assert its participant
/// entry, kick the room's bot, start the media stream.
async fn on_answered(engine: &Engine, call_id: &str) {
    let Some((room, policy)) = engine.store.policy_for_call(call_id).await else {
        return;
    };

    if engine
        .store
        .consume_policy_flag(call_id, PolicyFlag::SyncParticipantOnAnswer)
        .await
    {
        engine
            .store
            .upsert_participant(
                &room,
                call_id,
                ParticipantUpdate {
                    label: policy.participant_label.clone(),
                    muted: Some(true),
                    on_hold: Some(false),
                    role: policy.participant_role,
                },
            )
            .await;
    }

    if engine
        .store
        .consume_policy_flag(call_id, PolicyFlag::KickBotOnAnswer)
        .await
    {
        engine
            .executor
            .spawn_kick_role(room.clone(), switchboard_types::ParticipantRole::Bot);
    }

    if policy.stream_audio && engine.store.claim_stream_start(call_id).await {
        let label = policy
            .participant_label
            .clone()
            .unwrap_or_else(|| call_id.to_string());
        engine
            .executor
            .spawn_start_stream(call_id.to_string(), label);
    }
}

/// A dialed-in leg never connected (no-answer/busy): put the waiting room
/// back into a talkable state if the policy asks for it.
async fn on_abandoned(engine: &Engine, call_id: &str) {
    if engine
        .store
        .consume_policy_flag(call_id, PolicyFlag::RecoverPeersOnAbandon)
        .await
    {
        if let Some((room, _)) = engine.store.policy_for_call(call_id).await {
            engine.executor.spawn_recover_peers(room);
        }
    }
}

fn status_note(role: LegRole, status: CallStatus, duration_secs: Option<i64>) -> String {
    let leg = role.label();
    match status {
        CallStatus::InProgress => format!("{leg} call answered"),
        CallStatus::Ringing => format!("{leg} call is ringing"),
        CallStatus::Initiated => format!("{leg} call initiated"),
        CallStatus::Failed => format!("{leg} call failed"),
        CallStatus::Busy => format!("{leg} call got busy signal"),
        CallStatus::NoAnswer => format!("{leg} call not answered"),
        CallStatus::Completed => match duration_secs {
            Some(secs) if secs > 0 => format!("{leg} call completed in {secs}s"),
            _ => format!("{leg} call completed (0s duration)"),
        },
    }
}
