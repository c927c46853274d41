//! Scriptable in-memory provider for tests.
//!
//! Records every operation with its arguments and can be told to fail the
//! next N invocations of a named operation, which is how retry behavior is
//! exercised without a live API.

use crate::{
    AddParticipantOptions, ParticipantControl, ProviderError, StreamParams, VoiceProvider,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use switchboard_types::Address;

/// One recorded provider invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    RedirectCall {
        call_id: String,
        url: String,
    },
    CompleteCall {
        call_id: String,
    },
    CreateCall {
        to: Address,
        from: Address,
        url: String,
    },
    CallFromAddress {
        call_id: String,
    },
    FindActiveConference {
        friendly_name: String,
    },
    ListParticipants {
        conference_sid: String,
    },
    UpdateParticipant {
        conference_sid: String,
        call_id: String,
        control: ParticipantControl,
    },
    RemoveParticipant {
        conference_sid: String,
        call_id: String,
    },
    AddParticipant {
        friendly_name: String,
        from: Address,
        to: Address,
        options: AddParticipantOptions,
    },
    StartMediaStream {
        call_id: String,
        stream_url: String,
        params: StreamParams,
    },
    StopMediaStream {
        call_id: String,
    },
    LatestRecording {
        call_id: String,
    },
    StopRecording {
        call_id: String,
        recording_sid: String,
    },
}

impl RecordedCall {
    fn op(&self) -> &'static str {
        match self {
            Self::RedirectCall { .. } => "redirect_call",
            Self::CompleteCall { .. } => "complete_call",
            Self::CreateCall { .. } => "create_call",
            Self::CallFromAddress { .. } => "call_from_address",
            Self::FindActiveConference { .. } => "find_active_conference",
            Self::ListParticipants { .. } => "list_participants",
            Self::UpdateParticipant { .. } => "update_participant",
            Self::RemoveParticipant { .. } => "remove_participant",
            Self::AddParticipant { .. } => "add_participant",
            Self::StartMediaStream { .. } => "start_media_stream",
            Self::StopMediaStream { .. } => "stop_media_stream",
            Self::LatestRecording { .. } => "latest_recording",
            Self::StopRecording { .. } => "stop_recording",
        }
    }
}

#[derive(Default)]
struct MockState {
    recorded: Vec<RecordedCall>,
    fail_remaining: HashMap<&'static str, u32>,
    conferences: HashMap<String, String>,
    participants: HashMap<String, Vec<String>>,
    from_addresses: HashMap<String, Address>,
    recordings: HashMap<String, String>,
    next_seq: u64,
}

#[derive(Default)]
pub struct MockVoiceProvider {
    state: Mutex<MockState>,
}

impl MockVoiceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the next `n` invocations of `op` to fail with a 500.
    pub fn fail_times(&self, op: &'static str, n: u32) {
        self.state.lock().unwrap().fail_remaining.insert(op, n);
    }

    pub fn seed_conference(&self, friendly_name: &str, sid: &str) {
        self.state
            .lock()
            .unwrap()
            .conferences
            .insert(friendly_name.to_string(), sid.to_string());
    }

    pub fn seed_participants(&self, conference_sid: &str, call_ids: &[&str]) {
        self.state.lock().unwrap().participants.insert(
            conference_sid.to_string(),
            call_ids.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub fn seed_from_address(&self, call_id: &str, from: Address) {
        self.state
            .lock()
            .unwrap()
            .from_addresses
            .insert(call_id.to_string(), from);
    }

    pub fn seed_recording(&self, call_id: &str, recording_sid: &str) {
        self.state
            .lock()
            .unwrap()
            .recordings
            .insert(call_id.to_string(), recording_sid.to_string());
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.state.lock().unwrap().recorded.clone()
    }

    /// How many times `op` was invoked, failures included.
    pub fn count(&self, op: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .recorded
            .iter()
            .filter(|c| c.op() == op)
            .count()
    }

    fn record(&self, call: RecordedCall) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        let op = call.op();
        state.recorded.push(call);
        match state.fail_remaining.get_mut(op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(ProviderError::Api {
                    status: 500,
                    body: "scripted failure".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn next_seq(&self) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.next_seq += 1;
        state.next_seq
    }
}

#[async_trait]
impl VoiceProvider for MockVoiceProvider {
    async fn redirect_call(&self, call_id: &str, url: &str) -> Result<(), ProviderError> {
        self.record(RecordedCall::RedirectCall {
            call_id: call_id.to_string(),
            url: url.to_string(),
        })
    }

    async fn complete_call(&self, call_id: &str) -> Result<(), ProviderError> {
        self.record(RecordedCall::CompleteCall {
            call_id: call_id.to_string(),
        })
    }

    async fn create_call(
        &self,
        to: &Address,
        from: &Address,
        url: &str,
    ) -> Result<String, ProviderError> {
        self.record(RecordedCall::CreateCall {
            to: to.clone(),
            from: from.clone(),
            url: url.to_string(),
        })?;
        Ok(format!("CA-mock-{}", self.next_seq()))
    }

    async fn call_from_address(&self, call_id: &str) -> Result<Address, ProviderError> {
        self.record(RecordedCall::CallFromAddress {
            call_id: call_id.to_string(),
        })?;
        self.state
            .lock()
            .unwrap()
            .from_addresses
            .get(call_id)
            .cloned()
            .ok_or(ProviderError::MissingField("from"))
    }

    async fn find_active_conference(
        &self,
        friendly_name: &str,
    ) -> Result<Option<String>, ProviderError> {
        self.record(RecordedCall::FindActiveConference {
            friendly_name: friendly_name.to_string(),
        })?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .conferences
            .get(friendly_name)
            .cloned())
    }

    async fn list_participants(
        &self,
        conference_sid: &str,
    ) -> Result<Vec<String>, ProviderError> {
        self.record(RecordedCall::ListParticipants {
            conference_sid: conference_sid.to_string(),
        })?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .participants
            .get(conference_sid)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_participant(
        &self,
        conference_sid: &str,
        call_id: &str,
        control: ParticipantControl,
    ) -> Result<(), ProviderError> {
        self.record(RecordedCall::UpdateParticipant {
            conference_sid: conference_sid.to_string(),
            call_id: call_id.to_string(),
            control,
        })
    }

    async fn remove_participant(
        &self,
        conference_sid: &str,
        call_id: &str,
    ) -> Result<(), ProviderError> {
        self.record(RecordedCall::RemoveParticipant {
            conference_sid: conference_sid.to_string(),
            call_id: call_id.to_string(),
        })
    }

    async fn add_participant(
        &self,
        friendly_name: &str,
        from: &Address,
        to: &Address,
        options: AddParticipantOptions,
    ) -> Result<String, ProviderError> {
        self.record(RecordedCall::AddParticipant {
            friendly_name: friendly_name.to_string(),
            from: from.clone(),
            to: to.clone(),
            options,
        })?;
        Ok(format!("CA-added-{}", self.next_seq()))
    }

    async fn start_media_stream(
        &self,
        call_id: &str,
        stream_url: &str,
        params: StreamParams,
    ) -> Result<String, ProviderError> {
        self.record(RecordedCall::StartMediaStream {
            call_id: call_id.to_string(),
            stream_url: stream_url.to_string(),
            params,
        })?;
        Ok(format!("MZ-mock-{}", self.next_seq()))
    }

    async fn stop_media_stream(&self, call_id: &str) -> Result<(), ProviderError> {
        self.record(RecordedCall::StopMediaStream {
            call_id: call_id.to_string(),
        })
    }

    async fn latest_recording(&self, call_id: &str) -> Result<Option<String>, ProviderError> {
        self.record(RecordedCall::LatestRecording {
            call_id: call_id.to_string(),
        })?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .recordings
            .get(call_id)
            .cloned())
    }

    async fn stop_recording(
        &self,
        call_id: &str,
        recording_sid: &str,
    ) -> Result<(), ProviderError> {
        self.record(RecordedCall::StopRecording {
            call_id: call_id.to_string(),
            recording_sid: recording_sid.to_string(),
        })
    }
}
