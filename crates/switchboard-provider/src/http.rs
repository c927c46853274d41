//! REST implementation of [`VoiceProvider`].
//!
//! The provider exposes a Twilio-compatible API: form-encoded writes, JSON
//! reads, HTTP basic auth with the account sid and token. Media streams are
//! given the call id as their unique name so they can be stopped without
//! tracking stream sids.

use crate::{
    AddParticipantOptions, ParticipantControl, ProviderConfig, ProviderError, StreamParams,
    VoiceProvider,
};
use async_trait::async_trait;
use serde::Deserialize;
use switchboard_types::Address;

const API_VERSION: &str = "2010-04-01";

pub struct HttpVoiceProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

#[derive(Deserialize)]
struct CallResource {
    sid: String,
    #[serde(default)]
    from: Option<String>,
}

#[derive(Deserialize)]
struct ConferenceResource {
    sid: String,
}

#[derive(Deserialize)]
struct ConferenceListResponse {
    conferences: Vec<ConferenceResource>,
}

#[derive(Deserialize)]
struct ParticipantResource {
    call_sid: String,
}

#[derive(Deserialize)]
struct ParticipantListResponse {
    participants: Vec<ParticipantResource>,
}

#[derive(Deserialize)]
struct StreamResource {
    sid: String,
}

#[derive(Deserialize)]
struct RecordingResource {
    sid: String,
}

#[derive(Deserialize)]
struct RecordingListResponse {
    recordings: Vec<RecordingResource>,
}

impl HttpVoiceProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/Accounts/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            API_VERSION,
            self.config.account_sid,
            path
        )
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(self.url(path))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(form)
            .send()
            .await?;
        self.check(response).await
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .get(self.url(path))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .query(query)
            .send()
            .await?;
        self.check(response).await
    }
}

#[async_trait]
impl VoiceProvider for HttpVoiceProvider {
    async fn redirect_call(&self, call_id: &str, url: &str) -> Result<(), ProviderError> {
        self.post_form(
            &format!("Calls/{call_id}.json"),
            &[("Url", url.to_string()), ("Method", "POST".to_string())],
        )
        .await?;
        Ok(())
    }

    async fn complete_call(&self, call_id: &str) -> Result<(), ProviderError> {
        self.post_form(
            &format!("Calls/{call_id}.json"),
            &[("Status", "completed".to_string())],
        )
        .await?;
        Ok(())
    }

    async fn create_call(
        &self,
        to: &Address,
        from: &Address,
        url: &str,
    ) -> Result<String, ProviderError> {
        let response = self
            .post_form(
                "Calls.json",
                &[
                    ("To", to.to_string()),
                    ("From", from.to_string()),
                    ("Url", url.to_string()),
                ],
            )
            .await?;
        let call: CallResource = response.json().await?;
        Ok(call.sid)
    }

    async fn call_from_address(&self, call_id: &str) -> Result<Address, ProviderError> {
        let response = self.get(&format!("Calls/{call_id}.json"), &[]).await?;
        let call: CallResource = response.json().await?;
        call.from
            .map(Address::from)
            .ok_or(ProviderError::MissingField("from"))
    }

    async fn find_active_conference(
        &self,
        friendly_name: &str,
    ) -> Result<Option<String>, ProviderError> {
        let response = self
            .get(
                "Conferences.json",
                &[
                    ("FriendlyName", friendly_name),
                    ("Status", "in-progress"),
                    ("PageSize", "1"),
                ],
            )
            .await?;
        let list: ConferenceListResponse = response.json().await?;
        Ok(list.conferences.into_iter().next().map(|c| c.sid))
    }

    async fn list_participants(
        &self,
        conference_sid: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let response = self
            .get(
                &format!("Conferences/{conference_sid}/Participants.json"),
                &[],
            )
            .await?;
        let list: ParticipantListResponse = response.json().await?;
        Ok(list.participants.into_iter().map(|p| p.call_sid).collect())
    }

    async fn update_participant(
        &self,
        conference_sid: &str,
        call_id: &str,
        control: ParticipantControl,
    ) -> Result<(), ProviderError> {
        let mut form: Vec<(&str, String)> = Vec::new();
        if let Some(hold) = control.hold {
            form.push(("Hold", hold.to_string()));
        }
        if let Some(muted) = control.muted {
            form.push(("Muted", muted.to_string()));
        }
        if let Some(hold_url) = control.hold_url {
            form.push(("HoldUrl", hold_url));
        }
        if let Some(announce_url) = control.announce_url {
            form.push(("AnnounceUrl", announce_url));
        }
        self.post_form(
            &format!("Conferences/{conference_sid}/Participants/{call_id}.json"),
            &form,
        )
        .await?;
        Ok(())
    }

    async fn remove_participant(
        &self,
        conference_sid: &str,
        call_id: &str,
    ) -> Result<(), ProviderError> {
        let response = self
            .client
            .delete(self.url(&format!(
                "Conferences/{conference_sid}/Participants/{call_id}.json"
            )))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }

    async fn add_participant(
        &self,
        friendly_name: &str,
        from: &Address,
        to: &Address,
        options: AddParticipantOptions,
    ) -> Result<String, ProviderError> {
        let mut form = vec![
            ("From", from.to_string()),
            ("To", to.to_string()),
            ("Muted", options.muted.to_string()),
            (
                "StartConferenceOnEnter",
                options.start_conference_on_enter.to_string(),
            ),
            (
                "EndConferenceOnExit",
                options.end_conference_on_exit.to_string(),
            ),
        ];
        if let Some(label) = options.label {
            form.push(("Label", label));
        }
        let response = self
            .post_form(
                &format!("Conferences/{friendly_name}/Participants.json"),
                &form,
            )
            .await?;
        let participant: ParticipantResource = response.json().await?;
        Ok(participant.call_sid)
    }

    async fn start_media_stream(
        &self,
        call_id: &str,
        stream_url: &str,
        params: StreamParams,
    ) -> Result<String, ProviderError> {
        let form = vec![
            ("Url", stream_url.to_string()),
            // Named after the call so it can be stopped without the sid.
            ("Name", call_id.to_string()),
            ("Track", "both_tracks".to_string()),
            ("Parameter1.Name", "flow_kind".to_string()),
            ("Parameter1.Value", params.flow_kind),
            ("Parameter2.Name", "inbound_label".to_string()),
            ("Parameter2.Value", params.inbound_label),
            ("Parameter3.Name", "outbound_label".to_string()),
            ("Parameter3.Value", params.outbound_label),
            ("Parameter4.Name", "started_epoch".to_string()),
            ("Parameter4.Value", params.started_epoch.to_string()),
        ];
        let response = self
            .post_form(&format!("Calls/{call_id}/Streams.json"), &form)
            .await?;
        let stream: StreamResource = response.json().await?;
        Ok(stream.sid)
    }

    async fn stop_media_stream(&self, call_id: &str) -> Result<(), ProviderError> {
        self.post_form(
            &format!("Calls/{call_id}/Streams/{call_id}.json"),
            &[("Status", "stopped".to_string())],
        )
        .await?;
        Ok(())
    }

    async fn latest_recording(&self, call_id: &str) -> Result<Option<String>, ProviderError> {
        let response = self
            .get(
                &format!("Calls/{call_id}/Recordings.json"),
                &[("Status", "in-progress"), ("PageSize", "1")],
            )
            .await?;
        let list: RecordingListResponse = response.json().await?;
        Ok(list.recordings.into_iter().next().map(|r| r.sid))
    }

    async fn stop_recording(
        &self,
        call_id: &str,
        recording_sid: &str,
    ) -> Result<(), ProviderError> {
        self.post_form(
            &format!("Calls/{call_id}/Recordings/{recording_sid}.json"),
            &[("Status", "stopped".to_string())],
        )
        .await?;
        Ok(())
    }
}
