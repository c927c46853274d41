//! In-memory event store for call legs, conference rooms, and participants.
//!
//! The store exclusively owns all entities; routers and the flow layer mutate
//! them through the operations here. Every read-modify-write runs under a
//! single write-lock acquisition, so each entity update is atomic per key and
//! no lock is ever held across an `.await` point.
//!
//! Lookups that miss return `Option`/`false` rather than erroring: webhook
//! processing treats unknown keys as soft no-ops.

mod model;

pub use model::{CallEventRecord, CallLeg, ConferenceRoom, Participant, ParticipantUpdate};

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use switchboard_types::{AddParticipantSpec, Address, CallJoinPolicy, LegRole, PolicyFlag};
use tokio::sync::RwLock;

type LegMap = HashMap<String, CallLeg>;
type RoomMap = HashMap<String, ConferenceRoom>;

/// Shared in-memory state. Cheap to clone; clones share the same maps.
#[derive(Clone, Default)]
pub struct Store {
    legs: Arc<RwLock<LegMap>>,
    rooms: Arc<RwLock<RoomMap>>,
    /// call_id -> friendly name of the room holding that leg's join policy.
    policy_rooms: Arc<RwLock<HashMap<String, String>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- call legs ----------------------------------------------------

    /// Creates the leg if it is not yet known and returns its role.
    /// `parent_call_id` is only applied on creation; the first classification
    /// of a leg wins.
    pub async fn upsert_leg(&self, call_id: &str, parent_call_id: Option<&str>) -> LegRole {
        let mut legs = self.legs.write().await;
        legs.entry(call_id.to_string())
            .or_insert_with(|| CallLeg::new(call_id, parent_call_id))
            .role
    }

    /// Appends a status record to the leg's event log and captures the
    /// from/to addresses on first sight.
    pub async fn append_event(&self, call_id: &str, record: CallEventRecord) {
        let mut legs = self.legs.write().await;
        let Some(leg) = legs.get_mut(call_id) else {
            return;
        };
        if leg.from.is_none() {
            leg.from = record.from.clone();
        }
        if leg.to.is_none() {
            leg.to = record.to.clone();
        }
        leg.events.push(record);
    }

    /// Sets `ringing_at` if unset. Returns whether this call set it.
    pub async fn mark_ringing(&self, call_id: &str, at: DateTime<Utc>) -> bool {
        let mut legs = self.legs.write().await;
        match legs.get_mut(call_id) {
            Some(leg) if leg.ringing_at.is_none() => {
                leg.ringing_at = Some(at);
                true
            }
            _ => false,
        }
    }

    /// Sets `answered_at` if unset. Returns whether this call set it.
    pub async fn mark_answered(&self, call_id: &str, at: DateTime<Utc>) -> bool {
        let mut legs = self.legs.write().await;
        match legs.get_mut(call_id) {
            Some(leg) if leg.answered_at.is_none() => {
                leg.answered_at = Some(at);
                true
            }
            _ => false,
        }
    }

    /// Sets `ended_at` if unset. Returns whether this call set it.
    pub async fn mark_ended(&self, call_id: &str, at: DateTime<Utc>) -> bool {
        let mut legs = self.legs.write().await;
        match legs.get_mut(call_id) {
            Some(leg) if leg.ended_at.is_none() => {
                leg.ended_at = Some(at);
                true
            }
            _ => false,
        }
    }

    /// Returns the ring duration in whole seconds exactly once per leg, and
    /// only once both `ringing_at` and `ended_at` are set.
    pub async fn take_ring_duration(&self, call_id: &str) -> Option<i64> {
        let mut legs = self.legs.write().await;
        let leg = legs.get_mut(call_id)?;
        if leg.ring_duration_emitted {
            return None;
        }
        let (ringing, ended) = (leg.ringing_at?, leg.ended_at?);
        leg.ring_duration_emitted = true;
        // Round-half-up on the millisecond remainder.
        Some((ended - ringing + chrono::Duration::milliseconds(500)).num_seconds())
    }

    /// One-shot claim of the parent/child linkage notification for a leg,
    /// creating a bare leg entry if the id has not been seen yet (a child
    /// callback can reference a parent whose own callbacks lag behind).
    pub async fn claim_link_notice(&self, call_id: &str) -> bool {
        let mut legs = self.legs.write().await;
        let leg = legs
            .entry(call_id.to_string())
            .or_insert_with(|| CallLeg::new(call_id, None));
        if leg.link_notified {
            false
        } else {
            leg.link_notified = true;
            true
        }
    }

    /// Claims the start of a media stream on a leg, creating a bare leg entry
    /// when the conference callback outruns the call callbacks. Returns
    /// `false` when a stream is already active, so duplicate events don't
    /// start a second stream.
    pub async fn claim_stream_start(&self, call_id: &str) -> bool {
        let mut legs = self.legs.write().await;
        let leg = legs
            .entry(call_id.to_string())
            .or_insert_with(|| CallLeg::new(call_id, None));
        if leg.stream_active {
            false
        } else {
            leg.stream_active = true;
            true
        }
    }

    pub async fn set_stream_active(&self, call_id: &str, active: bool) {
        let mut legs = self.legs.write().await;
        if let Some(leg) = legs.get_mut(call_id) {
            leg.stream_active = active;
        }
    }

    pub async fn first_event(&self, call_id: &str) -> Option<CallEventRecord> {
        let legs = self.legs.read().await;
        legs.get(call_id)?.events.first().cloned()
    }

    pub async fn set_dial_target(&self, call_id: &str, target: Address) {
        let mut legs = self.legs.write().await;
        legs.entry(call_id.to_string())
            .or_insert_with(|| CallLeg::new(call_id, None))
            .dial_target = Some(target);
    }

    pub async fn dial_target(&self, call_id: &str) -> Option<Address> {
        let legs = self.legs.read().await;
        legs.get(call_id)?.dial_target.clone()
    }

    pub async fn leg_snapshot(&self, call_id: &str) -> Option<CallLeg> {
        let legs = self.legs.read().await;
        legs.get(call_id).cloned()
    }

    // ---- conference rooms ---------------------------------------------

    /// Creates the room if it is not yet known.
    pub async fn ensure_room(&self, friendly_name: &str) {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(friendly_name.to_string())
            .or_insert_with(|| ConferenceRoom::new(friendly_name));
    }

    /// Records the provider-assigned conference sid. Set at most once: a
    /// conflicting later value is ignored and logged.
    pub async fn set_conference_sid(&self, friendly_name: &str, sid: &str) {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .entry(friendly_name.to_string())
            .or_insert_with(|| ConferenceRoom::new(friendly_name));
        match &room.conference_sid {
            None => room.conference_sid = Some(sid.to_string()),
            Some(existing) if existing != sid => {
                tracing::warn!(
                    room = friendly_name,
                    existing = %existing,
                    incoming = sid,
                    "ignoring conflicting conference sid"
                );
            }
            Some(_) => {}
        }
    }

    /// Records the operator identity that created the room; first write wins.
    pub async fn set_created_by(&self, friendly_name: &str, identity: &str) {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .entry(friendly_name.to_string())
            .or_insert_with(|| ConferenceRoom::new(friendly_name));
        if room.created_by.is_none() {
            room.created_by = Some(identity.to_string());
        }
    }

    pub async fn mark_conference_started(&self, friendly_name: &str, at: DateTime<Utc>) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get_mut(friendly_name) {
            if room.started_at.is_none() {
                room.started_at = Some(at);
            }
        }
    }

    pub async fn mark_conference_ended(&self, friendly_name: &str) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get_mut(friendly_name) {
            room.ended = true;
        }
    }

    /// Merges a partial participant update. A field the callback omitted
    /// keeps its previously recorded value; defaults apply only when the
    /// participant has never been seen.
    ///
    /// The merge (rather than overwrite) matches the provider's habit of
    /// omitting mute/hold on some callback variants; whether that is the
    /// intended product behavior is an open question, preserved as-is.
    pub async fn upsert_participant(
        &self,
        friendly_name: &str,
        call_id: &str,
        update: ParticipantUpdate,
    ) {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .entry(friendly_name.to_string())
            .or_insert_with(|| ConferenceRoom::new(friendly_name));
        let participant = room
            .participants
            .entry(call_id.to_string())
            .or_insert_with(|| Participant {
                call_id: call_id.to_string(),
                label: None,
                muted: false,
                on_hold: false,
                role: None,
                left: false,
            });
        if let Some(label) = update.label {
            participant.label = Some(label);
        }
        if let Some(muted) = update.muted {
            participant.muted = muted;
        }
        if let Some(on_hold) = update.on_hold {
            participant.on_hold = on_hold;
        }
        if let Some(role) = update.role {
            participant.role = Some(role);
        }
    }

    /// Returns `false` when the room or participant is unknown.
    pub async fn set_participant_hold(
        &self,
        friendly_name: &str,
        call_id: &str,
        on_hold: bool,
    ) -> bool {
        let mut rooms = self.rooms.write().await;
        match rooms
            .get_mut(friendly_name)
            .and_then(|r| r.participants.get_mut(call_id))
        {
            Some(p) => {
                p.on_hold = on_hold;
                true
            }
            None => false,
        }
    }

    /// Returns `false` when the room or participant is unknown.
    pub async fn set_participant_muted(
        &self,
        friendly_name: &str,
        call_id: &str,
        muted: bool,
    ) -> bool {
        let mut rooms = self.rooms.write().await;
        match rooms
            .get_mut(friendly_name)
            .and_then(|r| r.participants.get_mut(call_id))
        {
            Some(p) => {
                p.muted = muted;
                true
            }
            None => false,
        }
    }

    /// Marks a participant as having left. The entry is retained for room
    /// history; `left` is never reset.
    pub async fn mark_participant_left(&self, friendly_name: &str, call_id: &str) {
        let mut rooms = self.rooms.write().await;
        if let Some(p) = rooms
            .get_mut(friendly_name)
            .and_then(|r| r.participants.get_mut(call_id))
        {
            p.left = true;
        }
    }

    pub async fn participants(&self, friendly_name: &str) -> Option<Vec<Participant>> {
        let rooms = self.rooms.read().await;
        rooms
            .get(friendly_name)
            .map(|r| r.participants.values().cloned().collect())
    }

    pub async fn room_snapshot(&self, friendly_name: &str) -> Option<ConferenceRoom> {
        let rooms = self.rooms.read().await;
        rooms.get(friendly_name).cloned()
    }

    pub async fn conference_sid(&self, friendly_name: &str) -> Option<String> {
        let rooms = self.rooms.read().await;
        rooms.get(friendly_name)?.conference_sid.clone()
    }

    /// Whether the room exists and has not ended. Actions re-check this
    /// before mutating, since a conference may end between scheduling and
    /// execution.
    pub async fn room_active(&self, friendly_name: &str) -> bool {
        let rooms = self.rooms.read().await;
        rooms.get(friendly_name).is_some_and(|r| !r.ended)
    }

    // ---- join policy ---------------------------------------------------

    /// Writes a leg's join policy into the room and indexes the leg so the
    /// call router can find the policy by call id alone.
    pub async fn set_join_policy(
        &self,
        friendly_name: &str,
        call_id: &str,
        policy: CallJoinPolicy,
    ) {
        {
            let mut rooms = self.rooms.write().await;
            let room = rooms
                .entry(friendly_name.to_string())
                .or_insert_with(|| ConferenceRoom::new(friendly_name));
            room.join_policy.insert(call_id.to_string(), policy);
        }
        let mut index = self.policy_rooms.write().await;
        index.insert(call_id.to_string(), friendly_name.to_string());
    }

    /// Snapshot of a leg's policy together with the room that holds it.
    pub async fn policy_for_call(&self, call_id: &str) -> Option<(String, CallJoinPolicy)> {
        let room_key = {
            let index = self.policy_rooms.read().await;
            index.get(call_id)?.clone()
        };
        let rooms = self.rooms.read().await;
        let policy = rooms.get(&room_key)?.join_policy.get(call_id)?.clone();
        Some((room_key, policy))
    }

    /// Atomically tests and clears a consumable policy flag. Returns `true`
    /// exactly once per armed flag; duplicate event delivery sees `false`.
    pub async fn consume_policy_flag(&self, call_id: &str, flag: PolicyFlag) -> bool {
        let room_key = {
            let index = self.policy_rooms.read().await;
            match index.get(call_id) {
                Some(key) => key.clone(),
                None => return false,
            }
        };
        let mut rooms = self.rooms.write().await;
        let Some(policy) = rooms
            .get_mut(&room_key)
            .and_then(|r| r.join_policy.get_mut(call_id))
        else {
            return false;
        };
        if policy.flag(flag) {
            policy.set_flag(flag, false);
            true
        } else {
            false
        }
    }

    /// Re-arms a flag after an action exhausted its retries, so the next
    /// genuine event can trigger it again.
    pub async fn restore_policy_flag(&self, call_id: &str, flag: PolicyFlag) {
        let room_key = {
            let index = self.policy_rooms.read().await;
            match index.get(call_id) {
                Some(key) => key.clone(),
                None => return,
            }
        };
        let mut rooms = self.rooms.write().await;
        if let Some(policy) = rooms
            .get_mut(&room_key)
            .and_then(|r| r.join_policy.get_mut(call_id))
        {
            policy.set_flag(flag, true);
        }
    }

    /// Takes the third-party add spec carried by a leg's policy, guarded by
    /// the room's one-shot flag: the first claim wins, across both the
    /// join- and hold-triggered paths.
    pub async fn take_add_spec(&self, call_id: &str) -> Option<(String, AddParticipantSpec)> {
        let room_key = {
            let index = self.policy_rooms.read().await;
            index.get(call_id)?.clone()
        };
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(&room_key)?;
        if room.third_party_added {
            return None;
        }
        let spec = room.join_policy.get(call_id)?.add_to_conference.clone()?;
        room.third_party_added = true;
        Some((room_key, spec))
    }
}
