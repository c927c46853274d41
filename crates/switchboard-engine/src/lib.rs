//! Call and conference orchestration.
//!
//! The [`Engine`] ties the event store, the voice provider, and the realtime
//! channel together: webhook payloads come in through `handle_*`, operator
//! flows through [`Engine::hold_call`] / [`Engine::unhold_call`] /
//! [`Engine::warm_transfer`], and everything worth showing an operator goes
//! out as [`Outbound`] frames over the channel returned by [`Engine::new`].

mod call_router;
mod conference_router;
mod executor;
mod flows;
pub mod urls;

pub use executor::{ActionError, ActionExecutor};
pub use flows::{transfer_policy, FlowError, LegFlags, WarmTransferParams};

use std::sync::Arc;
use switchboard_provider::VoiceProvider;
use switchboard_store::Store;
use switchboard_types::{
    Address, CallStatusWebhook, ConferenceStatusWebhook, Outbound, RealtimeEvent,
    RecordingEventPayload, RecordingStatusWebhook,
};
use tokio::sync::mpsc;
use url::Url;

/// Platform-level settings the engine needs for provider calls.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// The platform's own outbound caller id; filtered out when inferring a
    /// parent's dialable address.
    pub caller_id: Address,
    /// Public base URL of the voice-response layer.
    pub public_url: Url,
    /// WebSocket endpoint media streams are forked to.
    pub stream_url: String,
}

#[derive(Clone)]
pub struct Engine {
    pub(crate) store: Store,
    pub(crate) provider: Arc<dyn VoiceProvider>,
    pub(crate) executor: ActionExecutor,
    pub(crate) settings: Arc<EngineSettings>,
    events: mpsc::UnboundedSender<Outbound>,
}

impl Engine {
    /// Builds the engine and returns the receiving end of its realtime
    /// channel; the server drains it into the WebSocket fan-out.
    pub fn new(
        store: Store,
        provider: Arc<dyn VoiceProvider>,
        settings: EngineSettings,
    ) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let settings = Arc::new(settings);
        let (events, receiver) = mpsc::unbounded_channel();
        let executor = ActionExecutor::new(store.clone(), provider.clone(), settings.clone());
        (
            Self {
                store,
                provider,
                executor,
                settings,
                events,
            },
            receiver,
        )
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    /// Ingests a raw call-status callback. Malformed payloads are logged and
    /// dropped; the webhook layer acknowledges regardless.
    pub async fn handle_call_status(&self, webhook: CallStatusWebhook) {
        match webhook.validate() {
            Ok(event) => call_router::handle(self, event).await,
            Err(err) => {
                tracing::warn!(%err, "discarding malformed call-status payload");
            }
        }
    }

    /// Ingests a raw conference-status callback.
    pub async fn handle_conference_status(&self, webhook: ConferenceStatusWebhook) {
        match webhook.validate() {
            Ok(event) => conference_router::handle(self, event).await,
            Err(err) => {
                tracing::warn!(%err, "discarding malformed conference-status payload");
            }
        }
    }

    /// Ingests a raw recording-status callback and relays it to operators.
    pub async fn handle_recording_status(&self, webhook: RecordingStatusWebhook) {
        match webhook.validate() {
            Ok(event) => {
                let outbound = match event.identity.clone() {
                    Some(identity) => Outbound::to_room(
                        identity,
                        RealtimeEvent::RecordingEvent(RecordingEventPayload::from(&event)),
                    ),
                    None => Outbound::to_all(RealtimeEvent::RecordingEvent(
                        RecordingEventPayload::from(&event),
                    )),
                };
                self.publish(outbound);
                tracing::debug!(
                    recording_id = event.recording_id,
                    call_id = event.call_id,
                    "recording-status event relayed"
                );
            }
            Err(err) => {
                tracing::warn!(%err, "discarding malformed recording-status payload");
            }
        }
    }

    /// Parks the child leg in a hold conference and drops the parent.
    pub async fn hold_call(
        &self,
        child_call_id: &str,
        parent_call_id: &str,
        parent_target: Option<Address>,
    ) -> Result<(), FlowError> {
        flows::hold_call(self, child_call_id, parent_call_id, parent_target).await
    }

    /// Dials a held parent back into their hold conference.
    pub async fn unhold_call(&self, parent_call_id: &str) -> Result<(), FlowError> {
        flows::unhold_call(self, parent_call_id).await
    }

    /// Moves both legs of a call into a fresh transfer conference.
    pub async fn warm_transfer(&self, params: WarmTransferParams) -> Result<(), FlowError> {
        flows::warm_transfer(self, params).await
    }

    pub(crate) fn publish(&self, outbound: Outbound) {
        if self.events.send(outbound).is_err() {
            tracing::debug!("realtime channel closed, dropping event");
        }
    }
}
