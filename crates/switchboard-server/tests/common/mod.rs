use std::sync::Arc;
use switchboard_engine::{Engine, EngineSettings};
use switchboard_provider::MockVoiceProvider;
use switchboard_server::{ws, AppState};
use switchboard_store::Store;
use switchboard_types::{Address, Outbound};
use tokio::sync::mpsc::UnboundedReceiver;
use url::Url;

pub fn test_state() -> (AppState, Arc<MockVoiceProvider>, UnboundedReceiver<Outbound>) {
    let provider = Arc::new(MockVoiceProvider::new());
    let settings = EngineSettings {
        caller_id: Address::parse("+15550009999"),
        public_url: Url::parse("https://voice.test").expect("base url"),
        stream_url: "wss://stream.test/media".to_string(),
    };
    let (engine, events) = Engine::new(Store::new(), provider.clone(), settings);
    let state = AppState {
        engine,
        connections: ws::ConnectionManager::new(),
    };
    (state, provider, events)
}

/// Drains every frame currently queued on the realtime channel.
pub fn drain(receiver: &mut UnboundedReceiver<Outbound>) -> Vec<Outbound> {
    let mut frames = Vec::new();
    while let Ok(frame) = receiver.try_recv() {
        frames.push(frame);
    }
    frames
}
