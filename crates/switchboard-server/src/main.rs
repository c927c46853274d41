//! Switchboard server binary — the main entry point for the platform.
//!
//! Starts an axum HTTP server with structured logging, wires the
//! orchestration engine to the live voice provider, and shuts down
//! gracefully on SIGTERM/SIGINT.

use std::net::SocketAddr;
use std::sync::Arc;
use switchboard_engine::{Engine, EngineSettings};
use switchboard_provider::{HttpVoiceProvider, ProviderConfig};
use switchboard_server::{app, config, ws, AppState};
use switchboard_store::Store;
use switchboard_types::Address;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("SWITCHBOARD_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    let public_url = url::Url::parse(&config.urls.public_url)
        .expect("failed to parse urls.public_url — check the config");
    let settings = EngineSettings {
        caller_id: Address::parse(&config.provider.caller_id),
        public_url,
        stream_url: config.urls.stream_url.clone(),
    };
    let provider = Arc::new(HttpVoiceProvider::new(ProviderConfig {
        base_url: config.provider.base_url.clone(),
        account_sid: config.provider.account_sid.clone(),
        auth_token: config.provider.auth_token.clone(),
    }));

    let (engine, events) = Engine::new(Store::default(), provider, settings);
    let connections = ws::ConnectionManager::new();

    // Fan realtime events out to connected operators.
    tokio::spawn(ws::run_event_pump(events, connections.clone()));

    let state = AppState {
        engine,
        connections,
    };
    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting switchboard server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("switchboard server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
