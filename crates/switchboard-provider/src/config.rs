use serde::Deserialize;

/// Credentials and endpoint of the upstream voice provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the provider's REST API.
    pub base_url: String,
    pub account_sid: String,
    pub auth_token: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.twilio.com".to_string(),
            account_sid: String::new(),
            auth_token: String::new(),
        }
    }
}
