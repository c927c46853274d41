//! Operator-initiated hold, unhold, and warm-transfer flows.
//!
//! Each flow decides the per-leg join policy up front, writes it into the
//! store, and then redirects legs through the provider; the conference and
//! call routers execute the rest as the provider's callbacks arrive.

use crate::{urls, Engine};
use std::time::Duration;
use switchboard_provider::ProviderError;
use switchboard_types::{Address, AddParticipantSpec, CallJoinPolicy, ParticipantRole};
use switchboard_store::ParticipantUpdate;
use thiserror::Error;

const CONFERENCE_LOOKUP_ATTEMPTS: u32 = 5;
const CONFERENCE_LOOKUP_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum FlowError {
    /// No dialable address was cached for the held parent.
    #[error("Parent number not found for given SID")]
    MissingDialTarget,

    #[error("Conference not found or not in progress")]
    ConferenceNotFound,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Per-leg hold/mute flags produced by the transfer decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegFlags {
    pub held: bool,
    pub muted: bool,
}

/// Warm-transfer request parameters.
#[derive(Debug, Clone)]
pub struct WarmTransferParams {
    pub parent_call_id: String,
    pub child_call_id: String,
    pub parent_name: String,
    pub child_name: String,
    pub parent_role: ParticipantRole,
    pub child_role: ParticipantRole,
    pub identity: Option<String>,
    /// Third party to pull in once both legs are parked in the conference.
    pub transfer_to: Option<Address>,
}

/// Decision table for the warm-transfer hold/mute flags, keyed on the two
/// legs' roles. A bot parent behaves like an agent parent; a customer
/// transferring to another customer gets the customer-parent row.
pub fn transfer_policy(parent: ParticipantRole, child: ParticipantRole) -> (LegFlags, LegFlags) {
    match (parent, child) {
        (ParticipantRole::Customer, _) => (
            LegFlags {
                held: true,
                muted: false,
            },
            LegFlags {
                held: true,
                muted: true,
            },
        ),
        (_, ParticipantRole::Customer) => (
            LegFlags {
                held: false,
                muted: true,
            },
            LegFlags {
                held: false,
                muted: false,
            },
        ),
        _ => (
            LegFlags {
                held: false,
                muted: true,
            },
            LegFlags {
                held: false,
                muted: true,
            },
        ),
    }
}

/// Parks the child leg in a hold-music conference, drops the parent leg, and
/// caches the parent's dialable address for the later unhold.
pub(crate) async fn hold_call(
    engine: &Engine,
    child_call_id: &str,
    parent_call_id: &str,
    parent_target: Option<Address>,
) -> Result<(), FlowError> {
    let room = format!("CallRoom_{parent_call_id}");
    engine.store.ensure_room(&room).await;

    let join_url = urls::hold_join(&engine.settings.public_url, &room).to_string();
    engine.provider.redirect_call(child_call_id, &join_url).await?;
    engine.provider.complete_call(parent_call_id).await?;

    let target = match parent_target {
        Some(target) => Some(target),
        None => infer_dial_target(engine, parent_call_id).await,
    };
    match target {
        Some(target) => {
            engine
                .store
                .set_dial_target(parent_call_id, target.clone())
                .await;
            tracing::info!(parent_call_id, room, target = %target, "parent parked, dial target cached");
        }
        None => {
            tracing::warn!(parent_call_id, room, "no dial target determined, unhold may fail");
        }
    }
    Ok(())
}

/// The parent's address, preferring the flow parameter, then the first
/// recorded event's from/to with the platform's own caller id filtered out,
/// then a provider fetch.
async fn infer_dial_target(engine: &Engine, parent_call_id: &str) -> Option<Address> {
    if let Some(first) = engine.store.first_event(parent_call_id).await {
        for candidate in [first.from, first.to].into_iter().flatten() {
            if candidate != engine.settings.caller_id {
                return Some(candidate);
            }
        }
    }
    match engine.provider.call_from_address(parent_call_id).await {
        Ok(address) => Some(address),
        Err(err) => {
            tracing::warn!(parent_call_id, %err, "could not fetch parent address");
            None
        }
    }
}

/// Greets the held participants and dials the parent's cached address back
/// into the conference.
pub(crate) async fn unhold_call(engine: &Engine, parent_call_id: &str) -> Result<(), FlowError> {
    let room = format!("CallRoom_{parent_call_id}");
    let target = engine
        .store
        .dial_target(parent_call_id)
        .await
        .ok_or(FlowError::MissingDialTarget)?;

    // Room creation is asynchronous on the provider side; poll briefly.
    let mut conference_sid = None;
    for attempt in 1..=CONFERENCE_LOOKUP_ATTEMPTS {
        match engine.provider.find_active_conference(&room).await {
            Ok(Some(sid)) => {
                conference_sid = Some(sid);
                break;
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(room, attempt, %err, "conference lookup failed, retrying");
            }
        }
        if attempt < CONFERENCE_LOOKUP_ATTEMPTS {
            tokio::time::sleep(CONFERENCE_LOOKUP_DELAY).await;
        }
    }
    let conference_sid = conference_sid.ok_or(FlowError::ConferenceNotFound)?;
    engine.store.set_conference_sid(&room, &conference_sid).await;

    // Best effort: everyone already waiting hears the reconnect greeting.
    let greeting_url = urls::greet_then_rejoin(&engine.settings.public_url, &room).to_string();
    match engine.provider.list_participants(&conference_sid).await {
        Ok(participants) => {
            for call_id in participants {
                if let Err(err) = engine.provider.redirect_call(&call_id, &greeting_url).await {
                    tracing::warn!(room, call_id, %err, "could not play reconnect greeting");
                }
            }
        }
        Err(err) => {
            tracing::warn!(room, %err, "could not list participants for greeting");
        }
    }

    let connect_url = urls::connect_to_conference(&engine.settings.public_url, &room).to_string();
    let new_call_id = engine
        .provider
        .create_call(&target, &engine.settings.caller_id, &connect_url)
        .await?;
    engine.store.upsert_leg(&new_call_id, None).await;
    tracing::info!(room, new_call_id, to = %target, "parent redialed into conference");
    Ok(())
}

/// Moves both legs into a fresh transfer conference with role-derived
/// hold/mute flags, then leaves the third-party handover to the routers.
pub(crate) async fn warm_transfer(
    engine: &Engine,
    params: WarmTransferParams,
) -> Result<(), FlowError> {
    let room = format!(
        "{}'s-conference-with-{}",
        params.parent_name, params.child_name
    );

    // Any in-flight recording would capture the handover; stop it first and
    // remember the sid so it can be resumed later. Failures are non-fatal.
    let (parent_recording, child_recording) = stop_initial_recording(engine, &params).await;

    let (parent_flags, child_flags) = transfer_policy(params.parent_role, params.child_role);

    engine.store.ensure_room(&room).await;
    if let Some(identity) = &params.identity {
        engine.store.set_created_by(&room, identity).await;
    }

    let child_policy = CallJoinPolicy {
        hold_on_join: child_flags.held,
        mute_on_join: child_flags.muted,
        start_conference_on_enter: false,
        end_conference_on_exit: true,
        participant_role: Some(params.child_role),
        participant_label: Some(params.child_name.clone()),
        initial_recording_sid: child_recording,
        ..Default::default()
    };
    let parent_policy = CallJoinPolicy {
        hold_on_join: parent_flags.held,
        mute_on_join: parent_flags.muted,
        start_conference_on_enter: true,
        end_conference_on_exit: false,
        participant_role: Some(params.parent_role),
        participant_label: Some(params.parent_name.clone()),
        initial_recording_sid: parent_recording,
        add_to_conference: params.transfer_to.clone().map(|to| AddParticipantSpec {
            to,
            role: Some(ParticipantRole::Agent),
            label: None,
            identity: params.identity.clone(),
        }),
        ..Default::default()
    };
    engine
        .store
        .set_join_policy(&room, &params.child_call_id, child_policy)
        .await;
    engine
        .store
        .set_join_policy(&room, &params.parent_call_id, parent_policy)
        .await;

    let child_url = urls::conference_join(
        &engine.settings.public_url,
        &room,
        &urls::JoinOptions {
            label: Some(params.child_name.clone()),
            muted: child_flags.muted,
            start_conference_on_enter: false,
            end_conference_on_exit: true,
            role: Some(params.child_role),
            identity: params.identity.clone(),
        },
    )
    .to_string();
    engine
        .provider
        .redirect_call(&params.child_call_id, &child_url)
        .await?;
    engine
        .store
        .upsert_participant(
            &room,
            &params.child_call_id,
            ParticipantUpdate {
                label: Some(params.child_name.clone()),
                muted: Some(child_flags.muted),
                on_hold: Some(child_flags.held),
                role: Some(params.child_role),
            },
        )
        .await;

    let parent_url = urls::conference_join(
        &engine.settings.public_url,
        &room,
        &urls::JoinOptions {
            label: Some(params.parent_name.clone()),
            muted: parent_flags.muted,
            start_conference_on_enter: true,
            end_conference_on_exit: false,
            role: Some(params.parent_role),
            identity: params.identity.clone(),
        },
    )
    .to_string();
    engine
        .provider
        .redirect_call(&params.parent_call_id, &parent_url)
        .await?;
    engine
        .store
        .upsert_participant(
            &room,
            &params.parent_call_id,
            ParticipantUpdate {
                label: Some(params.parent_name.clone()),
                muted: Some(parent_flags.muted),
                on_hold: Some(parent_flags.held),
                role: Some(params.parent_role),
            },
        )
        .await;

    tracing::info!(
        room,
        parent = params.parent_call_id,
        child = params.child_call_id,
        "both legs redirected into transfer conference"
    );
    Ok(())
}

/// Stops the most recent in-progress recording on the parent leg, falling
/// back to the child leg. Returns the stopped sid slotted to its leg.
async fn stop_initial_recording(
    engine: &Engine,
    params: &WarmTransferParams,
) -> (Option<String>, Option<String>) {
    for (call_id, slot) in [(&params.parent_call_id, 0), (&params.child_call_id, 1)] {
        match engine.provider.latest_recording(call_id).await {
            Ok(Some(recording_sid)) => {
                if let Err(err) = engine.provider.stop_recording(call_id, &recording_sid).await {
                    tracing::warn!(call_id, recording_sid, %err, "could not stop recording");
                    return (None, None);
                }
                tracing::info!(call_id, recording_sid, "initial recording stopped");
                return if slot == 0 {
                    (Some(recording_sid), None)
                } else {
                    (None, Some(recording_sid))
                };
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(call_id, %err, "could not look up recordings");
                return (None, None);
            }
        }
    }
    (None, None)
}
