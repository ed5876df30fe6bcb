//! The A2E server binary.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use a2e_api::{router, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env("A2E_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("A2E_CONFIG").ok());
    let config = match config_path {
        Some(path) => {
            info!(config = %path, "loading configuration");
            ServerConfig::load(&path).with_context(|| format!("loading config from {path}"))?
        }
        None => {
            info!("no configuration given, using defaults");
            ServerConfig::default()
        }
    };

    let address = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::build(&config).context("building application state")?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(%address, "a2e server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("serving")?;

    Ok(())
}
