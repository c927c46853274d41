//! Background actions against the voice provider.
//!
//! Webhook handling must acknowledge fast, so every provider mutation a
//! webhook triggers is spawned here as a fire-and-forget task with a fixed
//! attempt bound and a 1-second delay between attempts. Before each attempt
//! the target conference is re-resolved: the room may have ended between
//! scheduling and execution, and retries must not mutate a dead conference.
//!
//! On final failure the action is logged and abandoned. Where the action was
//! armed by a consumable policy flag, the flag is re-armed so a later genuine
//! event can trigger it again.

use crate::{urls, EngineSettings};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use switchboard_provider::{
    AddParticipantOptions, ParticipantControl, ProviderError, StreamParams, VoiceProvider,
};
use switchboard_store::{ParticipantUpdate, Store};
use switchboard_types::{AddParticipantSpec, CallJoinPolicy, ParticipantRole, PolicyFlag};
use thiserror::Error;

const RETRY_DELAY: Duration = Duration::from_secs(1);
const HOLD_ATTEMPTS: u32 = 5;
const GREETING_ATTEMPTS: u32 = 5;
const STREAM_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("conference room `{0}` is unknown")]
    RoomNotFound(String),

    #[error("conference `{0}` is not active")]
    ConferenceNotActive(String),

    #[error("participant `{1}` not found in conference `{0}`")]
    ParticipantNotFound(String, String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Clone)]
pub struct ActionExecutor {
    store: Store,
    provider: Arc<dyn VoiceProvider>,
    settings: Arc<EngineSettings>,
}

impl ActionExecutor {
    pub fn new(store: Store, provider: Arc<dyn VoiceProvider>, settings: Arc<EngineSettings>) -> Self {
        Self {
            store,
            provider,
            settings,
        }
    }

    /// Resolves the provider conference sid for a room, store first, provider
    /// lookup as fallback. Fails when the room is unknown or already over.
    async fn resolve_conference(&self, room: &str) -> Result<String, ActionError> {
        let Some(snapshot) = self.store.room_snapshot(room).await else {
            return Err(ActionError::RoomNotFound(room.to_string()));
        };
        if snapshot.ended {
            return Err(ActionError::ConferenceNotActive(room.to_string()));
        }
        if let Some(sid) = snapshot.conference_sid {
            return Ok(sid);
        }
        match self.provider.find_active_conference(room).await? {
            Some(sid) => {
                self.store.set_conference_sid(room, &sid).await;
                Ok(sid)
            }
            None => Err(ActionError::ConferenceNotActive(room.to_string())),
        }
    }

    /// Places a just-joined participant on hold with hold music. Up to five
    /// attempts; the participant may not be visible to the provider yet on
    /// the first.
    pub fn spawn_hold_on_join(&self, room: String, call_id: String) {
        let this = self.clone();
        tokio::spawn(async move {
            let hold_url = urls::hold_music(&this.settings.public_url).to_string();
            for attempt in 1..=HOLD_ATTEMPTS {
                match this.try_hold(&room, &call_id, &hold_url).await {
                    Ok(()) => {
                        this.store.set_participant_hold(&room, &call_id, true).await;
                        tracing::info!(room, call_id, "participant placed on hold");
                        return;
                    }
                    Err(ActionError::RoomNotFound(_) | ActionError::ConferenceNotActive(_)) => {
                        tracing::warn!(room, call_id, "hold-on-join target gone, giving up");
                        return;
                    }
                    Err(err) => {
                        tracing::warn!(
                            room,
                            call_id,
                            attempt,
                            %err,
                            "hold-on-join attempt failed"
                        );
                    }
                }
                if attempt < HOLD_ATTEMPTS {
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
            this.store
                .restore_policy_flag(&call_id, PolicyFlag::HoldOnJoin)
                .await;
            tracing::error!(room, call_id, "hold-on-join abandoned after retries");
        });
    }

    async fn try_hold(&self, room: &str, call_id: &str, hold_url: &str) -> Result<(), ActionError> {
        let sid = self.resolve_conference(room).await?;
        let control = ParticipantControl {
            hold: Some(true),
            hold_url: Some(hold_url.to_string()),
            ..Default::default()
        };
        self.provider
            .update_participant(&sid, call_id, control)
            .await?;
        Ok(())
    }

    /// Redirects a participant through the greeting announcement, after which
    /// the voice layer rejoins them to the same conference.
    pub fn spawn_play_greeting(&self, room: String, call_id: String) {
        let this = self.clone();
        tokio::spawn(async move {
            let url = urls::greet_then_rejoin(&this.settings.public_url, &room).to_string();
            for attempt in 1..=GREETING_ATTEMPTS {
                if !this.store.room_active(&room).await {
                    tracing::warn!(room, call_id, "greeting target gone, giving up");
                    return;
                }
                match this.provider.redirect_call(&call_id, &url).await {
                    Ok(()) => {
                        tracing::info!(room, call_id, "greeting redirect issued");
                        return;
                    }
                    Err(err) => {
                        tracing::warn!(room, call_id, attempt, %err, "greeting attempt failed");
                    }
                }
                if attempt < GREETING_ATTEMPTS {
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
            this.store
                .restore_policy_flag(&call_id, PolicyFlag::PlayGreetingOnJoin)
                .await;
            tracing::error!(room, call_id, "greeting abandoned after retries");
        });
    }

    /// Starts forking the leg's audio to the transcription endpoint. The
    /// caller has already claimed the leg's stream slot; on final failure the
    /// slot is released so a later event can try again.
    pub fn spawn_start_stream(&self, call_id: String, participant_label: String) {
        let this = self.clone();
        tokio::spawn(async move {
            let params = StreamParams {
                flow_kind: "conference".to_string(),
                inbound_label: "conference".to_string(),
                outbound_label: participant_label,
                started_epoch: Utc::now().timestamp(),
            };
            for attempt in 1..=STREAM_ATTEMPTS {
                match this
                    .provider
                    .start_media_stream(&call_id, &this.settings.stream_url, params.clone())
                    .await
                {
                    Ok(stream_sid) => {
                        tracing::info!(call_id, stream_sid, "media stream started");
                        return;
                    }
                    Err(err) => {
                        tracing::warn!(call_id, attempt, %err, "media stream start failed");
                    }
                }
                if attempt < STREAM_ATTEMPTS {
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
            this.store.set_stream_active(&call_id, false).await;
            tracing::error!(call_id, "media stream start abandoned after retries");
        });
    }

    /// Stops the leg's media stream, single attempt.
    pub fn spawn_stop_stream(&self, call_id: String) {
        let this = self.clone();
        tokio::spawn(async move {
            this.store.set_stream_active(&call_id, false).await;
            if let Err(err) = this.provider.stop_media_stream(&call_id).await {
                tracing::warn!(call_id, %err, "media stream stop failed");
            }
        });
    }

    /// Dials a third party straight into the conference, single attempt, and
    /// records the join policy for the new leg so its own status callbacks
    /// drive the rest of the handover.
    pub fn spawn_add_participant(&self, room: String, spec: AddParticipantSpec) {
        let this = self.clone();
        tokio::spawn(async move {
            if !this.store.room_active(&room).await {
                tracing::warn!(room, "add-participant target gone, giving up");
                return;
            }
            let options = AddParticipantOptions {
                label: spec.label.clone(),
                muted: false,
                start_conference_on_enter: true,
                end_conference_on_exit: false,
            };
            let result = this
                .provider
                .add_participant(&room, &this.settings.caller_id, &spec.to, options)
                .await;
            match result {
                Ok(new_call_id) => {
                    this.store.upsert_leg(&new_call_id, None).await;
                    let policy = CallJoinPolicy {
                        end_conference_on_exit: false,
                        participant_role: spec.role,
                        participant_label: spec.label.clone(),
                        sync_participant_on_answer: true,
                        kick_bot_on_answer: matches!(spec.role, Some(ParticipantRole::Agent)),
                        recover_peers_on_abandon: true,
                        stream_audio: true,
                        ..Default::default()
                    };
                    this.store.set_join_policy(&room, &new_call_id, policy).await;
                    tracing::info!(room, new_call_id, to = %spec.to, "third party dialed into conference");
                }
                Err(err) => {
                    tracing::error!(room, to = %spec.to, %err, "failed to add third party");
                }
            }
        });
    }

    /// Removes every participant carrying `role` from the room.
    pub fn spawn_kick_role(&self, room: String, role: ParticipantRole) {
        let this = self.clone();
        tokio::spawn(async move {
            let sid = match this.resolve_conference(&room).await {
                Ok(sid) => sid,
                Err(err) => {
                    tracing::warn!(room, %err, "kick-role target unavailable");
                    return;
                }
            };
            let participants = this.store.participants(&room).await.unwrap_or_default();
            for p in participants
                .iter()
                .filter(|p| !p.left && p.role == Some(role))
            {
                match this.provider.remove_participant(&sid, &p.call_id).await {
                    Ok(()) => {
                        this.store.mark_participant_left(&room, &p.call_id).await;
                        tracing::info!(room, call_id = p.call_id, ?role, "participant kicked");
                    }
                    Err(err) => {
                        tracing::warn!(room, call_id = p.call_id, %err, "kick failed");
                    }
                }
            }
        });
    }

    /// Unholds and unmutes the room's customer and bot participants, used
    /// when a dialed-in third party never answers.
    pub fn spawn_recover_peers(&self, room: String) {
        let this = self.clone();
        tokio::spawn(async move {
            let sid = match this.resolve_conference(&room).await {
                Ok(sid) => sid,
                Err(err) => {
                    tracing::warn!(room, %err, "recover-peers target unavailable");
                    return;
                }
            };
            let participants = this.store.participants(&room).await.unwrap_or_default();
            for p in participants.iter().filter(|p| {
                !p.left
                    && matches!(
                        p.role,
                        Some(ParticipantRole::Customer) | Some(ParticipantRole::Bot)
                    )
            }) {
                let control = ParticipantControl {
                    hold: Some(false),
                    muted: Some(false),
                    ..Default::default()
                };
                match this
                    .provider
                    .update_participant(&sid, &p.call_id, control)
                    .await
                {
                    Ok(()) => {
                        this.store
                            .upsert_participant(
                                &room,
                                &p.call_id,
                                ParticipantUpdate {
                                    muted: Some(false),
                                    on_hold: Some(false),
                                    ..Default::default()
                                },
                            )
                            .await;
                        tracing::info!(room, call_id = p.call_id, "participant recovered");
                    }
                    Err(err) => {
                        tracing::warn!(room, call_id = p.call_id, %err, "recover failed");
                    }
                }
            }
        });
    }

    // ---- synchronous operator-control actions --------------------------

    pub async fn mute_participant(
        &self,
        room: &str,
        call_id: &str,
        muted: bool,
    ) -> Result<(), ActionError> {
        let sid = self.resolve_conference(room).await?;
        self.provider
            .update_participant(&sid, call_id, ParticipantControl::muted(muted))
            .await?;
        if !self.store.set_participant_muted(room, call_id, muted).await {
            return Err(ActionError::ParticipantNotFound(
                room.to_string(),
                call_id.to_string(),
            ));
        }
        Ok(())
    }

    pub async fn hold_participant(
        &self,
        room: &str,
        call_id: &str,
        on_hold: bool,
    ) -> Result<(), ActionError> {
        let sid = self.resolve_conference(room).await?;
        let control = ParticipantControl {
            hold: Some(on_hold),
            hold_url: on_hold.then(|| urls::hold_music(&self.settings.public_url).to_string()),
            ..Default::default()
        };
        self.provider
            .update_participant(&sid, call_id, control)
            .await?;
        if !self.store.set_participant_hold(room, call_id, on_hold).await {
            return Err(ActionError::ParticipantNotFound(
                room.to_string(),
                call_id.to_string(),
            ));
        }
        Ok(())
    }

    pub async fn kick_participant(&self, room: &str, call_id: &str) -> Result<(), ActionError> {
        let sid = self.resolve_conference(room).await?;
        self.provider.remove_participant(&sid, call_id).await?;
        self.store.mark_participant_left(room, call_id).await;
        Ok(())
    }
}
