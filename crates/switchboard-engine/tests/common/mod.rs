use std::sync::Arc;
use std::time::Duration;
use switchboard_engine::{Engine, EngineSettings};
use switchboard_provider::MockVoiceProvider;
use switchboard_store::Store;
use switchboard_types::{Address, CallStatusWebhook, ConferenceStatusWebhook, Outbound};
use tokio::sync::mpsc::UnboundedReceiver;
use url::Url;

pub const CALLER_ID: &str = "+15550009999";

pub fn engine() -> (Engine, Arc<MockVoiceProvider>, UnboundedReceiver<Outbound>) {
    let store = Store::new();
    let provider = Arc::new(MockVoiceProvider::new());
    let settings = EngineSettings {
        caller_id: Address::parse(CALLER_ID),
        public_url: Url::parse("https://voice.test").expect("base url"),
        stream_url: "wss://stream.test/media".to_string(),
    };
    let (engine, receiver) = Engine::new(store, provider.clone(), settings);
    (engine, provider, receiver)
}

/// Polls until the condition holds. Under `start_paused` the sleeps advance
/// virtual time, so retrying background tasks make progress too.
pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out waiting for: {what}");
}

pub fn call_webhook(
    sid: &str,
    parent_sid: Option<&str>,
    status: &str,
    identity: Option<&str>,
) -> CallStatusWebhook {
    CallStatusWebhook {
        call_sid: Some(sid.to_string()),
        parent_call_sid: parent_sid.map(str::to_string),
        call_status: Some(status.to_string()),
        identity: identity.map(str::to_string),
        ..Default::default()
    }
}

pub fn conference_webhook(
    event: &str,
    friendly_name: &str,
    call_sid: Option<&str>,
) -> ConferenceStatusWebhook {
    ConferenceStatusWebhook {
        status_callback_event: Some(event.to_string()),
        friendly_name: Some(friendly_name.to_string()),
        call_sid: call_sid.map(str::to_string),
        ..Default::default()
    }
}

/// Drains every frame currently queued on the realtime channel.
pub fn drain(receiver: &mut UnboundedReceiver<Outbound>) -> Vec<Outbound> {
    let mut frames = Vec::new();
    while let Ok(frame) = receiver.try_recv() {
        frames.push(frame);
    }
    frames
}
