use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("provider response missing field: {0}")]
    MissingField(&'static str),
}
