//! Client seam for the upstream voice provider.
//!
//! The engine talks to the provider exclusively through the [`VoiceProvider`]
//! trait. [`HttpVoiceProvider`] is the production implementation over the
//! provider's REST API; [`MockVoiceProvider`] records calls and scripts
//! failures for tests.

mod config;
mod error;
mod http;
pub mod mock;

pub use config::ProviderConfig;
pub use error::ProviderError;
pub use http::HttpVoiceProvider;
pub use mock::{MockVoiceProvider, RecordedCall};

use async_trait::async_trait;
use switchboard_types::Address;

/// Partial update of a live conference participant. `None` fields are left
/// untouched on the provider side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantControl {
    pub hold: Option<bool>,
    pub muted: Option<bool>,
    /// Audio to loop while held; only meaningful together with `hold: true`.
    pub hold_url: Option<String>,
    /// One-shot announcement played to the participant.
    pub announce_url: Option<String>,
}

impl ParticipantControl {
    pub fn hold(on_hold: bool) -> Self {
        Self {
            hold: Some(on_hold),
            ..Default::default()
        }
    }

    pub fn muted(muted: bool) -> Self {
        Self {
            muted: Some(muted),
            ..Default::default()
        }
    }
}

/// Options for dialing a new participant directly into a conference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddParticipantOptions {
    pub label: Option<String>,
    pub muted: bool,
    pub start_conference_on_enter: bool,
    pub end_conference_on_exit: bool,
}

/// Parameters for attaching a unidirectional media stream to a call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamParams {
    pub flow_kind: String,
    pub inbound_label: String,
    pub outbound_label: String,
    pub started_epoch: i64,
}

/// Operations the control plane needs from the telephony provider.
///
/// Implementations must be safe to share across tasks; the engine holds a
/// single `Arc<dyn VoiceProvider>` for the process lifetime.
#[async_trait]
pub trait VoiceProvider: Send + Sync {
    /// Redirects an in-progress call to a new voice-instruction URL.
    async fn redirect_call(&self, call_id: &str, url: &str) -> Result<(), ProviderError>;

    /// Hangs up a call.
    async fn complete_call(&self, call_id: &str) -> Result<(), ProviderError>;

    /// Creates an outbound call and returns the new call's id.
    async fn create_call(
        &self,
        to: &Address,
        from: &Address,
        url: &str,
    ) -> Result<String, ProviderError>;

    /// Fetches the originating address of a call.
    async fn call_from_address(&self, call_id: &str) -> Result<Address, ProviderError>;

    /// Resolves a friendly name to the sid of its in-progress conference,
    /// if one exists.
    async fn find_active_conference(
        &self,
        friendly_name: &str,
    ) -> Result<Option<String>, ProviderError>;

    /// Lists the call ids of a conference's current participants.
    async fn list_participants(&self, conference_sid: &str)
        -> Result<Vec<String>, ProviderError>;

    async fn update_participant(
        &self,
        conference_sid: &str,
        call_id: &str,
        control: ParticipantControl,
    ) -> Result<(), ProviderError>;

    /// Kicks a participant out of a conference.
    async fn remove_participant(
        &self,
        conference_sid: &str,
        call_id: &str,
    ) -> Result<(), ProviderError>;

    /// Dials `to` straight into the named conference and returns the new
    /// participant's call id.
    async fn add_participant(
        &self,
        friendly_name: &str,
        from: &Address,
        to: &Address,
        options: AddParticipantOptions,
    ) -> Result<String, ProviderError>;

    /// Starts forking a call's audio to `stream_url`. Returns the stream sid.
    async fn start_media_stream(
        &self,
        call_id: &str,
        stream_url: &str,
        params: StreamParams,
    ) -> Result<String, ProviderError>;

    /// Stops all active media streams on a call.
    async fn stop_media_stream(&self, call_id: &str) -> Result<(), ProviderError>;

    /// Returns the sid of the call's most recent in-progress recording.
    async fn latest_recording(&self, call_id: &str) -> Result<Option<String>, ProviderError>;

    async fn stop_recording(
        &self,
        call_id: &str,
        recording_sid: &str,
    ) -> Result<(), ProviderError>;
}
