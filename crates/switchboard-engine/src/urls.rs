//! Builders for the voice-instruction URLs handed to the provider.
//!
//! The URLs point back at the platform's voice-response layer, which renders
//! the actual dial/conference instructions. The engine only decides which
//! instruction a leg gets and with which parameters.

use switchboard_types::ParticipantRole;
use url::Url;

/// Query parameters for joining a leg into a named conference.
#[derive(Debug, Clone, Default)]
pub struct JoinOptions {
    pub label: Option<String>,
    pub muted: bool,
    pub start_conference_on_enter: bool,
    pub end_conference_on_exit: bool,
    pub role: Option<ParticipantRole>,
    pub identity: Option<String>,
}

fn at_path(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    url.set_path(path);
    url.set_query(None);
    url
}

/// Join instruction used by the hold flow: an on-hold announcement, then the
/// conference with looping hold music.
pub fn hold_join(base: &Url, conference_name: &str) -> Url {
    let mut url = at_path(base, "/voice/hold-join");
    url.query_pairs_mut()
        .append_pair("conference_name", conference_name);
    url
}

/// Join instruction used by the transfer flow, with the full participant
/// parameter set.
pub fn conference_join(base: &Url, conference_name: &str, opts: &JoinOptions) -> Url {
    let mut url = at_path(base, "/voice/join-conference");
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("conference_name", conference_name);
        if let Some(label) = &opts.label {
            query.append_pair("participant_label", label);
        }
        query.append_pair("muted", if opts.muted { "true" } else { "false" });
        query.append_pair(
            "start_conference_on_enter",
            if opts.start_conference_on_enter {
                "true"
            } else {
                "false"
            },
        );
        query.append_pair(
            "end_conference_on_exit",
            if opts.end_conference_on_exit {
                "true"
            } else {
                "false"
            },
        );
        if let Some(role) = opts.role {
            query.append_pair("role", role.as_str());
        }
        if let Some(identity) = &opts.identity {
            query.append_pair("identity", identity);
        }
    }
    url
}

/// Plays the reconnect announcement, then rejoins the same conference.
pub fn greet_then_rejoin(base: &Url, conference_name: &str) -> Url {
    let mut url = at_path(base, "/voice/greet-then-rejoin");
    url.query_pairs_mut()
        .append_pair("conference_name", conference_name);
    url
}

/// Plain conference join, used when dialing a dropped parent back in.
pub fn connect_to_conference(base: &Url, conference_name: &str) -> Url {
    let mut url = at_path(base, "/voice/connect-to-conference");
    url.query_pairs_mut()
        .append_pair("conference_name", conference_name);
    url
}

/// Looping hold-music audio, passed as the participant hold URL.
pub fn hold_music(base: &Url) -> Url {
    at_path(base, "/voice/hold-music")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://voice.example.com").unwrap()
    }

    #[test]
    fn conference_join_carries_participant_parameters() {
        let url = conference_join(
            &base(),
            "alice's-conference-with-bob",
            &JoinOptions {
                label: Some("bob".to_string()),
                muted: true,
                start_conference_on_enter: false,
                end_conference_on_exit: true,
                role: Some(ParticipantRole::Customer),
                identity: Some("alice".to_string()),
            },
        );
        assert_eq!(url.path(), "/voice/join-conference");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("conference_name".into(), "alice's-conference-with-bob".into())));
        assert!(pairs.contains(&("muted".into(), "true".into())));
        assert!(pairs.contains(&("start_conference_on_enter".into(), "false".into())));
        assert!(pairs.contains(&("role".into(), "customer".into())));
    }

    #[test]
    fn base_path_and_query_are_replaced() {
        let base = Url::parse("https://voice.example.com/some/prefix?x=1").unwrap();
        let url = hold_music(&base);
        assert_eq!(url.path(), "/voice/hold-music");
        assert_eq!(url.query(), None);
    }
}
