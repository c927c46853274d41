//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Voice provider credentials and endpoint.
    #[serde(default)]
    pub provider: ProviderSettings,

    /// Public URLs handed to the provider in callbacks and redirects.
    #[serde(default)]
    pub urls: UrlSettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Voice provider account settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    /// Base URL of the provider's REST API.
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// Provider account identifier.
    #[serde(default)]
    pub account_sid: String,

    /// Provider auth token.
    #[serde(default)]
    pub auth_token: String,

    /// The platform's own outbound caller id, in wire form
    /// (`+E164` or `client:<name>`).
    #[serde(default)]
    pub caller_id: String,
}

/// URLs the provider needs to reach us and the media endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct UrlSettings {
    /// Public base URL of the voice-response layer.
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// WebSocket endpoint media streams are forked to.
    #[serde(default = "default_stream_url")]
    pub stream_url: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "switchboard_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_provider_base_url() -> String {
    "https://api.twilio.com".to_string()
}

fn default_public_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_stream_url() -> String {
    "wss://127.0.0.1:3000/media".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            account_sid: String::new(),
            auth_token: String::new(),
            caller_id: String::new(),
        }
    }
}

impl Default for UrlSettings {
    fn default() -> Self {
        Self {
            public_url: default_public_url(),
            stream_url: default_stream_url(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `SWITCHBOARD_HOST` overrides `server.host`
/// - `SWITCHBOARD_PORT` overrides `server.port`
/// - `SWITCHBOARD_BASE_URL` overrides `provider.base_url`
/// - `SWITCHBOARD_ACCOUNT_SID` overrides `provider.account_sid`
/// - `SWITCHBOARD_AUTH_TOKEN` overrides `provider.auth_token`
/// - `SWITCHBOARD_CALLER_ID` overrides `provider.caller_id`
/// - `SWITCHBOARD_PUBLIC_URL` overrides `urls.public_url`
/// - `SWITCHBOARD_STREAM_URL` overrides `urls.stream_url`
/// - `SWITCHBOARD_LOG_LEVEL` overrides `logging.level`
/// - `SWITCHBOARD_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("SWITCHBOARD_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("SWITCHBOARD_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(base_url) = std::env::var("SWITCHBOARD_BASE_URL") {
        config.provider.base_url = base_url;
    }
    if let Ok(sid) = std::env::var("SWITCHBOARD_ACCOUNT_SID") {
        config.provider.account_sid = sid;
    }
    if let Ok(token) = std::env::var("SWITCHBOARD_AUTH_TOKEN") {
        config.provider.auth_token = token;
    }
    if let Ok(caller_id) = std::env::var("SWITCHBOARD_CALLER_ID") {
        config.provider.caller_id = caller_id;
    }
    if let Ok(public_url) = std::env::var("SWITCHBOARD_PUBLIC_URL") {
        config.urls.public_url = public_url;
    }
    if let Ok(stream_url) = std::env::var("SWITCHBOARD_STREAM_URL") {
        config.urls.stream_url = stream_url;
    }
    if let Ok(level) = std::env::var("SWITCHBOARD_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("SWITCHBOARD_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_no_path_given() {
        let config = load_config(None).expect("defaults load");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.provider.base_url, "https://api.twilio.com");
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config(Some("/nonexistent/switchboard.toml")).expect("defaults load");
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn parses_toml_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"
[server]
port = 8080

[provider]
account_sid = "AC123"
auth_token = "secret"
caller_id = "+15550001111"

[urls]
public_url = "https://voice.example.com"

[logging]
level = "debug"
json = true
"#
        )
        .expect("write temp config");

        let config = load_config(file.path().to_str()).expect("config load");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.provider.account_sid, "AC123");
        assert_eq!(config.provider.caller_id, "+15550001111");
        assert_eq!(config.urls.public_url, "https://voice.example.com");
        // Unset sections keep their defaults.
        assert_eq!(config.urls.stream_url, "wss://127.0.0.1:3000/media");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn env_vars_override_file_values() {
        // Only fields no other test asserts, so parallel execution stays safe.
        std::env::set_var("SWITCHBOARD_AUTH_TOKEN", "from-env");
        std::env::set_var("SWITCHBOARD_HOST", "0.0.0.0");

        let config = load_config(None).expect("defaults load");
        assert_eq!(config.provider.auth_token, "from-env");
        assert_eq!(config.server.host.to_string(), "0.0.0.0");

        std::env::remove_var("SWITCHBOARD_AUTH_TOKEN");
        std::env::remove_var("SWITCHBOARD_HOST");
    }

    #[test]
    fn rejects_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "[server\nport = oops").expect("write temp config");
        assert!(matches!(
            load_config(file.path().to_str()),
            Err(ConfigError::Parse(_))
        ));
    }
}
