//! Realtime events pushed to operator UIs.
//!
//! Events serialize as `{"event": "<name>", "data": {...}}` frames. Payload
//! fields that are absent are skipped, keeping frames compact the way the
//! original socket emitter stripped `None` values.

use crate::{ConferenceStatusEvent, LegRole, RecordingStatusEvent};
use serde::Serialize;
use std::collections::HashSet;

/// A server-to-client realtime event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RealtimeEvent {
    CallEvent(CallEventPayload),
    ConferenceEvent(ConferenceEventPayload),
    RecordingEvent(RecordingEventPayload),
    ConnectedIdentities { identities: Vec<String> },
}

/// Call-leg notification: status updates, ring-duration notices, and
/// one-time parent/child linkage notices (distinguished by `kind`).
#[derive(Debug, Clone, Serialize)]
pub struct CallEventPayload {
    pub sid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_sid: Option<String>,
    #[serde(rename = "type")]
    pub leg: LegRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// `ring_duration`, `parent_call_sid`, or `child_call_sid` for the
    /// non-status notices; absent for plain status updates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
}

/// Conference notification, passed through from the validated callback.
#[derive(Debug, Clone, Serialize)]
pub struct ConferenceEventPayload {
    pub event: &'static str,
    pub conference_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conference_sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_sid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&ConferenceStatusEvent> for ConferenceEventPayload {
    fn from(ev: &ConferenceStatusEvent) -> Self {
        Self {
            event: ev.kind.as_str(),
            conference_name: ev.friendly_name.clone(),
            conference_sid: ev.conference_sid.clone(),
            call_sid: ev.call_sid.clone(),
            participant_label: ev.participant_label.clone(),
            sequence_number: ev.sequence_number,
            timestamp: ev.timestamp.clone(),
            reason: ev.reason.clone(),
        }
    }
}

/// Recording notification.
#[derive(Debug, Clone, Serialize)]
pub struct RecordingEventPayload {
    pub recording_sid: String,
    pub call_sid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
}

impl From<&RecordingStatusEvent> for RecordingEventPayload {
    fn from(ev: &RecordingStatusEvent) -> Self {
        Self {
            recording_sid: ev.recording_id.clone(),
            call_sid: ev.call_id.clone(),
            status: ev.status.clone(),
            url: ev.url.clone(),
            duration_secs: ev.duration_secs,
        }
    }
}

/// An event queued for fan-out, with its target room keys.
///
/// An empty target set means "broadcast to every connected session" — the
/// fallback when no room key could be resolved for a conference event.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub rooms: HashSet<String>,
    pub event: RealtimeEvent,
}

impl Outbound {
    pub fn to_room(room: impl Into<String>, event: RealtimeEvent) -> Self {
        Self {
            rooms: HashSet::from([room.into()]),
            event,
        }
    }

    pub fn to_all(event: RealtimeEvent) -> Self {
        Self {
            rooms: HashSet::new(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_event_frame_shape() {
        let event = RealtimeEvent::CallEvent(CallEventPayload {
            sid: "CA1".to_string(),
            parent_sid: None,
            leg: LegRole::Parent,
            status: Some("ringing".to_string()),
            from: None,
            to: None,
            timestamp: "2026-01-01 00:00:00".to_string(),
            note: Some("Parent call is ringing".to_string()),
            kind: None,
        });
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["event"], "call_event");
        assert_eq!(json["data"]["sid"], "CA1");
        assert_eq!(json["data"]["type"], "parent");
        // Absent optionals are skipped entirely.
        assert!(json["data"].get("parent_sid").is_none());
        assert!(json["data"].get("from").is_none());
    }

    #[test]
    fn connected_identities_frame_shape() {
        let event = RealtimeEvent::ConnectedIdentities {
            identities: vec!["alice".to_string(), "bob".to_string()],
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["event"], "connected_identities");
        assert_eq!(json["data"]["identities"][1], "bob");
    }
}
