//! Shared types, wire schemas, and constants for the Switchboard platform.
//!
//! This crate provides the foundational types used across all Switchboard
//! crates: call and participant status enums, the `Address` variant for
//! provider dial targets, validated webhook payload structs, per-leg join
//! policies, and realtime event payloads.
//!
//! No crate in the workspace depends on anything *except* `switchboard-types`
//! for cross-cutting type definitions. This keeps the dependency graph clean
//! and prevents circular dependencies.

use serde::{Deserialize, Serialize};

mod events;
mod policy;
mod realtime;

pub use events::{
    CallStatusEvent, CallStatusWebhook, ConferenceEventKind, ConferenceStatusEvent,
    ConferenceStatusWebhook, RecordingStatusEvent, RecordingStatusWebhook, WirePayloadError,
};
pub use policy::{AddParticipantSpec, CallJoinPolicy, PolicyFlag};
pub use realtime::{
    CallEventPayload, ConferenceEventPayload, Outbound, RealtimeEvent, RecordingEventPayload,
};

/// Lifecycle status of a single call leg, as reported by the provider's
/// status callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    Initiated,
    Ringing,
    InProgress,
    Completed,
    NoAnswer,
    Busy,
    Failed,
}

impl CallStatus {
    /// Parses the provider's hyphenated wire name. The provider reports an
    /// answered call as `in-progress`; the `answered` alias shows up on some
    /// callback variants.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initiated" => Some(Self::Initiated),
            "ringing" => Some(Self::Ringing),
            "in-progress" | "answered" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "no-answer" => Some(Self::NoAnswer),
            "busy" => Some(Self::Busy),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns the wire name for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Ringing => "ringing",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::NoAnswer => "no-answer",
            Self::Busy => "busy",
            Self::Failed => "failed",
        }
    }

    /// A leg in a terminal status will never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::NoAnswer | Self::Busy | Self::Failed
        )
    }
}

/// Whether a call leg is the originating (parent) segment or a dialed-out
/// (child) segment. A leg is a child iff its callback carries a parent call id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegRole {
    Parent,
    Child,
}

impl LegRole {
    /// Returns the capitalized label used in operator-facing notes.
    pub fn label(self) -> &'static str {
        match self {
            Self::Parent => "Parent",
            Self::Child => "Child",
        }
    }
}

/// Role of a conference participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Agent,
    Customer,
    Bot,
}

impl ParticipantRole {
    /// Parses a role string. The legacy `ai-voice-agent` label maps to `Bot`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "agent" => Some(Self::Agent),
            "customer" => Some(Self::Customer),
            "bot" | "ai-voice-agent" => Some(Self::Bot),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Customer => "customer",
            Self::Bot => "bot",
        }
    }
}

/// A dialable address, parsed once at ingress.
///
/// The provider marks internal softphone endpoints with a reserved `client:`
/// prefix; everything else is treated as a PSTN number. Keeping the
/// distinction in a tagged variant avoids re-parsing the prefix at every use
/// site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Address {
    /// An internal softphone endpoint (`client:<name>` on the wire).
    Client(String),
    /// A PSTN phone number.
    Phone(String),
}

const CLIENT_PREFIX: &str = "client:";

impl Address {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(CLIENT_PREFIX) {
            Some(name) => Self::Client(name.to_string()),
            None => Self::Phone(raw.to_string()),
        }
    }

    pub fn is_client(&self) -> bool {
        matches!(self, Self::Client(_))
    }
}

impl From<String> for Address {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.to_string()
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Client(name) => write!(f, "{CLIENT_PREFIX}{name}"),
            Self::Phone(number) => write!(f, "{number}"),
        }
    }
}
