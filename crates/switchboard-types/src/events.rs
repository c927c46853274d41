//! Webhook wire schemas and their validated event forms.
//!
//! The provider delivers callbacks as form- or query-encoded key/value pairs
//! with every field optional on the wire. Each raw `*Webhook` struct
//! deserializes permissively and is then narrowed by `validate()` into a
//! typed event, rejecting payloads whose required fields are missing. Routers
//! log and discard rejected payloads; the HTTP layer still acknowledges them.

use crate::{Address, CallStatus};
use serde::Deserialize;
use thiserror::Error;

/// Errors produced while narrowing a raw webhook payload.
#[derive(Debug, Error)]
pub enum WirePayloadError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unknown call status `{0}`")]
    UnknownStatus(String),

    #[error("unknown conference event `{0}`")]
    UnknownEvent(String),
}

/// Interprets the provider's loose boolean strings (`true`/`1`/`yes`).
fn parse_bool(s: &str) -> bool {
    matches!(s.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Raw call-status callback payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallStatusWebhook {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "ParentCallSid")]
    pub parent_call_sid: Option<String>,
    #[serde(rename = "CallStatus")]
    pub call_status: Option<String>,
    #[serde(rename = "From")]
    pub from: Option<String>,
    #[serde(rename = "To")]
    pub to: Option<String>,
    #[serde(rename = "CallDuration")]
    pub call_duration: Option<String>,
    /// Operator identity, carried as a query parameter on the callback URL.
    pub identity: Option<String>,
}

/// A validated call-status event.
#[derive(Debug, Clone)]
pub struct CallStatusEvent {
    pub call_id: String,
    pub parent_call_id: Option<String>,
    pub status: CallStatus,
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub duration_secs: Option<i64>,
    pub identity: Option<String>,
}

impl CallStatusWebhook {
    /// Narrows the raw payload. `CallSid` and a recognized `CallStatus` are
    /// required; everything else stays optional.
    pub fn validate(self) -> Result<CallStatusEvent, WirePayloadError> {
        let call_id = self
            .call_sid
            .filter(|s| !s.is_empty())
            .ok_or(WirePayloadError::MissingField("CallSid"))?;
        let raw_status = self
            .call_status
            .ok_or(WirePayloadError::MissingField("CallStatus"))?;
        let status = CallStatus::parse(&raw_status)
            .ok_or_else(|| WirePayloadError::UnknownStatus(raw_status))?;

        Ok(CallStatusEvent {
            call_id,
            parent_call_id: self.parent_call_sid.filter(|s| !s.is_empty()),
            status,
            from: self.from.as_deref().map(Address::parse),
            to: self.to.as_deref().map(Address::parse),
            duration_secs: self.call_duration.and_then(|d| d.parse().ok()),
            identity: self.identity,
        })
    }
}

/// Kinds of conference-status callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConferenceEventKind {
    ConferenceStart,
    ConferenceEnd,
    ParticipantJoin,
    ParticipantLeave,
    ParticipantMute,
    ParticipantUnmute,
    ParticipantHold,
    ParticipantUnhold,
}

impl ConferenceEventKind {
    /// Parses the `StatusCallbackEvent` value. The provider has used both
    /// short (`join`, `hold`) and prefixed (`participant-join`) spellings.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "conference-start" | "start" => Some(Self::ConferenceStart),
            "conference-end" | "end" => Some(Self::ConferenceEnd),
            "participant-join" | "join" => Some(Self::ParticipantJoin),
            "participant-leave" | "leave" => Some(Self::ParticipantLeave),
            "participant-mute" | "mute" => Some(Self::ParticipantMute),
            "participant-unmute" | "unmute" => Some(Self::ParticipantUnmute),
            "participant-hold" | "hold" => Some(Self::ParticipantHold),
            "participant-unhold" | "unhold" => Some(Self::ParticipantUnhold),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConferenceStart => "conference-start",
            Self::ConferenceEnd => "conference-end",
            Self::ParticipantJoin => "participant-join",
            Self::ParticipantLeave => "participant-leave",
            Self::ParticipantMute => "participant-mute",
            Self::ParticipantUnmute => "participant-unmute",
            Self::ParticipantHold => "participant-hold",
            Self::ParticipantUnhold => "participant-unhold",
        }
    }
}

/// Raw conference-status callback payload.
///
/// Different callback variants reference the affected call leg under
/// different parameter names; `validate()` coalesces them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConferenceStatusWebhook {
    #[serde(rename = "StatusCallbackEvent")]
    pub status_callback_event: Option<String>,
    #[serde(rename = "ConferenceSid")]
    pub conference_sid: Option<String>,
    #[serde(rename = "FriendlyName")]
    pub friendly_name: Option<String>,
    #[serde(rename = "SequenceNumber")]
    pub sequence_number: Option<String>,
    #[serde(rename = "Timestamp")]
    pub timestamp: Option<String>,
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "CallSidEndingConference")]
    pub call_sid_ending_conference: Option<String>,
    #[serde(rename = "ParticipantSid")]
    pub participant_sid: Option<String>,
    #[serde(rename = "ParticipantLabel")]
    pub participant_label: Option<String>,
    #[serde(rename = "Muted")]
    pub muted: Option<String>,
    #[serde(rename = "Hold")]
    pub hold: Option<String>,
    #[serde(rename = "Reason")]
    pub reason: Option<String>,
    #[serde(rename = "ReasonConferenceEnded")]
    pub reason_conference_ended: Option<String>,
    /// Operator identity, carried as a query parameter on the callback URL.
    pub identity: Option<String>,
}

/// A validated conference-status event.
#[derive(Debug, Clone)]
pub struct ConferenceStatusEvent {
    pub kind: ConferenceEventKind,
    pub friendly_name: String,
    pub conference_sid: Option<String>,
    pub call_sid: Option<String>,
    pub participant_label: Option<String>,
    pub muted: Option<bool>,
    pub hold: Option<bool>,
    pub sequence_number: Option<u64>,
    pub timestamp: Option<String>,
    pub reason: Option<String>,
    pub identity: Option<String>,
}

impl ConferenceStatusWebhook {
    /// Narrows the raw payload. `FriendlyName` and a recognized
    /// `StatusCallbackEvent` are required.
    pub fn validate(self) -> Result<ConferenceStatusEvent, WirePayloadError> {
        let friendly_name = self
            .friendly_name
            .filter(|s| !s.is_empty())
            .ok_or(WirePayloadError::MissingField("FriendlyName"))?;
        let raw_event = self
            .status_callback_event
            .ok_or(WirePayloadError::MissingField("StatusCallbackEvent"))?;
        let kind = ConferenceEventKind::parse(&raw_event)
            .ok_or_else(|| WirePayloadError::UnknownEvent(raw_event))?;

        Ok(ConferenceStatusEvent {
            kind,
            friendly_name,
            conference_sid: self.conference_sid,
            call_sid: self
                .call_sid
                .or(self.call_sid_ending_conference)
                .or(self.participant_sid)
                .filter(|s| !s.is_empty()),
            participant_label: self.participant_label.filter(|s| !s.is_empty()),
            muted: self.muted.as_deref().map(parse_bool),
            hold: self.hold.as_deref().map(parse_bool),
            sequence_number: self.sequence_number.and_then(|s| s.parse().ok()),
            timestamp: self.timestamp,
            reason: self.reason.or(self.reason_conference_ended),
            identity: self.identity,
        })
    }
}

/// Raw recording-status callback payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordingStatusWebhook {
    #[serde(rename = "RecordingSid")]
    pub recording_sid: Option<String>,
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "RecordingStatus")]
    pub recording_status: Option<String>,
    #[serde(rename = "RecordingUrl")]
    pub recording_url: Option<String>,
    #[serde(rename = "RecordingDuration")]
    pub recording_duration: Option<String>,
    pub identity: Option<String>,
}

/// A validated recording-status event.
#[derive(Debug, Clone)]
pub struct RecordingStatusEvent {
    pub recording_id: String,
    pub call_id: String,
    pub status: Option<String>,
    pub url: Option<String>,
    pub duration_secs: Option<i64>,
    pub identity: Option<String>,
}

impl RecordingStatusWebhook {
    pub fn validate(self) -> Result<RecordingStatusEvent, WirePayloadError> {
        let recording_id = self
            .recording_sid
            .filter(|s| !s.is_empty())
            .ok_or(WirePayloadError::MissingField("RecordingSid"))?;
        let call_id = self
            .call_sid
            .filter(|s| !s.is_empty())
            .ok_or(WirePayloadError::MissingField("CallSid"))?;

        Ok(RecordingStatusEvent {
            recording_id,
            call_id,
            status: self.recording_status,
            url: self.recording_url,
            duration_secs: self.recording_duration.and_then(|d| d.parse().ok()),
            identity: self.identity,
        })
    }
}
