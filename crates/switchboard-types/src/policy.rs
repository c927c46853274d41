//! Per-leg join/transfer policy.
//!
//! A `CallJoinPolicy` is decided at call-setup time (hold or warm-transfer
//! initiation) and executed piecemeal as the matching provider events arrive.
//! Each boolean action flag is consumed at most once; the store clears it the
//! moment the action is dispatched, which makes duplicate webhook delivery a
//! no-op.

use crate::{Address, ParticipantRole};
use serde::{Deserialize, Serialize};

/// A third-party address to pull into a conference once the designated
/// initiator leg has landed in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddParticipantSpec {
    pub to: Address,
    pub role: Option<ParticipantRole>,
    pub label: Option<String>,
    pub identity: Option<String>,
}

/// Policy attached to one call leg within one conference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallJoinPolicy {
    /// Place the participant on hold (with hold music) once they join.
    pub hold_on_join: bool,
    /// Redirect the participant through a greeting announcement on join.
    pub play_greeting_on_join: bool,
    /// Join the conference muted. Consumed at redirect time: the flag is
    /// encoded into the join URL served by the voice-response layer.
    pub mute_on_join: bool,
    pub start_conference_on_enter: bool,
    pub end_conference_on_exit: bool,
    /// Stream this leg's audio to the transcription endpoint. Persistent
    /// attribute, not consumed: hold/unhold toggles stop and restart the
    /// stream.
    pub stream_audio: bool,
    /// Third-party add, carried by the initiator leg only.
    pub add_to_conference: Option<AddParticipantSpec>,
    pub participant_role: Option<ParticipantRole>,
    pub participant_label: Option<String>,
    /// Re-assert the participant entry (muted, not held) when the leg answers.
    pub sync_participant_on_answer: bool,
    /// Remove the room's bot participant once the leg answers.
    pub kick_bot_on_answer: bool,
    /// On no-answer/busy of this leg, unhold and unmute the room's customer
    /// and bot participants.
    pub recover_peers_on_abandon: bool,
    /// Recording that was stopped when the transfer flow began, if any.
    pub initial_recording_sid: Option<String>,
}

/// The consumable boolean flags of a [`CallJoinPolicy`], used with the
/// store's atomic test-and-clear operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFlag {
    HoldOnJoin,
    PlayGreetingOnJoin,
    SyncParticipantOnAnswer,
    KickBotOnAnswer,
    RecoverPeersOnAbandon,
}

impl CallJoinPolicy {
    pub fn flag(&self, flag: PolicyFlag) -> bool {
        match flag {
            PolicyFlag::HoldOnJoin => self.hold_on_join,
            PolicyFlag::PlayGreetingOnJoin => self.play_greeting_on_join,
            PolicyFlag::SyncParticipantOnAnswer => self.sync_participant_on_answer,
            PolicyFlag::KickBotOnAnswer => self.kick_bot_on_answer,
            PolicyFlag::RecoverPeersOnAbandon => self.recover_peers_on_abandon,
        }
    }

    pub fn set_flag(&mut self, flag: PolicyFlag, value: bool) {
        match flag {
            PolicyFlag::HoldOnJoin => self.hold_on_join = value,
            PolicyFlag::PlayGreetingOnJoin => self.play_greeting_on_join = value,
            PolicyFlag::SyncParticipantOnAnswer => self.sync_participant_on_answer = value,
            PolicyFlag::KickBotOnAnswer => self.kick_bot_on_answer = value,
            PolicyFlag::RecoverPeersOnAbandon => self.recover_peers_on_abandon = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_accessors_cover_every_variant() {
        let flags = [
            PolicyFlag::HoldOnJoin,
            PolicyFlag::PlayGreetingOnJoin,
            PolicyFlag::SyncParticipantOnAnswer,
            PolicyFlag::KickBotOnAnswer,
            PolicyFlag::RecoverPeersOnAbandon,
        ];
        for flag in flags {
            let mut policy = CallJoinPolicy::default();
            assert!(!policy.flag(flag));
            policy.set_flag(flag, true);
            assert!(policy.flag(flag));
            // The other flags stay untouched.
            for other in flags.iter().filter(|f| **f != flag) {
                assert!(!policy.flag(*other));
            }
        }
    }
}
