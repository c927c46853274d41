//! Entities owned by the event store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use switchboard_types::{Address, CallJoinPolicy, CallStatus, LegRole, ParticipantRole};

/// One status callback as recorded on a leg's append-only event log.
#[derive(Debug, Clone, Serialize)]
pub struct CallEventRecord {
    pub status: CallStatus,
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub timestamp: DateTime<Utc>,
    pub duration_secs: Option<i64>,
}

/// One provider-tracked call segment. Created on the first callback that
/// references it (or when an outbound call is created); never deleted for the
/// lifetime of the process.
#[derive(Debug, Clone, Serialize)]
pub struct CallLeg {
    pub call_id: String,
    pub parent_call_id: Option<String>,
    pub role: LegRole,
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub ringing_at: Option<DateTime<Utc>>,
    pub answered_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub ring_duration_emitted: bool,
    /// One-shot guard for the parent/child linkage notification.
    pub link_notified: bool,
    /// Whether a media stream is currently running on this leg.
    pub stream_active: bool,
    /// Cached dialable address for reconnecting a dropped parent.
    pub dial_target: Option<Address>,
    pub events: Vec<CallEventRecord>,
}

impl CallLeg {
    pub(crate) fn new(call_id: &str, parent_call_id: Option<&str>) -> Self {
        let role = if parent_call_id.is_some() {
            LegRole::Child
        } else {
            LegRole::Parent
        };
        Self {
            call_id: call_id.to_string(),
            parent_call_id: parent_call_id.map(str::to_string),
            role,
            from: None,
            to: None,
            ringing_at: None,
            answered_at: None,
            ended_at: None,
            ring_duration_emitted: false,
            link_notified: false,
            stream_active: false,
            dial_target: None,
            events: Vec::new(),
        }
    }
}

/// A conference participant. `left` is monotonic: entries are kept after the
/// participant leaves so room summaries retain history.
#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub call_id: String,
    pub label: Option<String>,
    pub muted: bool,
    pub on_hold: bool,
    pub role: Option<ParticipantRole>,
    pub left: bool,
}

/// A partial participant update. `None` means "not reported", never "clear".
#[derive(Debug, Clone, Default)]
pub struct ParticipantUpdate {
    pub label: Option<String>,
    pub muted: Option<bool>,
    pub on_hold: Option<bool>,
    pub role: Option<ParticipantRole>,
}

/// A conference room, keyed by the provider's friendly name. Created lazily
/// on first reference.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConferenceRoom {
    pub friendly_name: String,
    /// Provider-assigned conference sid; set at most once.
    pub conference_sid: Option<String>,
    /// Operator identity that initiated the conference; set at most once.
    pub created_by: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended: bool,
    pub participants: HashMap<String, Participant>,
    pub join_policy: HashMap<String, CallJoinPolicy>,
    /// One-shot guard for the third-party add action.
    pub third_party_added: bool,
}

impl ConferenceRoom {
    pub(crate) fn new(friendly_name: &str) -> Self {
        Self {
            friendly_name: friendly_name.to_string(),
            ..Default::default()
        }
    }
}
