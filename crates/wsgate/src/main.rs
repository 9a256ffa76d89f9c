//! Gateway server entry point
//!
//! Run with:
//! ```bash
//! cargo run -p wsgate
//! ```
//!
//! Configuration is loaded from environment variables.

use tracing::{error, info};
use wsgate_common::{try_init_tracing_with_config, AppConfig, Environment, TracingConfig};

#[tokio::main]
async fn main() {
    // Load .env before picking the log format
    let _ = dotenvy::dotenv();
    let env = std::env::var("APP_ENV")
        .ok()
        .and_then(|s| Environment::from_name(&s))
        .unwrap_or_default();

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "Gateway failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting wsgate...");

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        env = ?config.app.env,
        port = config.gateway.port,
        max_connections = config.ws.max_connections,
        relay = config.relay.upstream_url.is_some(),
        "Configuration loaded"
    );

    wsgate::run(config).await?;

    Ok(())
}
