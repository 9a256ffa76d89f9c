//! Gateway server setup
//!
//! Provides the WebSocket server routes, startup and graceful shutdown.

mod handler;
mod state;

pub use handler::{health, reject, relay_route, session_route, HealthStatus};
pub use state::GatewayState;

use crate::handlers::EchoHandler;
use crate::protocol::CloseCode;
use crate::pump::RawDecoder;
use axum::{routing::get, Router};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use wsgate_common::{AppConfig, AppError};

/// Create the gateway router
///
/// `/relay` is only mounted when an upstream is configured.
pub fn create_router(config: &AppConfig) -> Router<GatewayState> {
    let router = Router::new()
        .route("/ws", session_route(RawDecoder, EchoHandler))
        .route("/health", get(health));

    match &config.relay.upstream_url {
        Some(url) => router.route("/relay", relay_route(url.clone())),
        None => router,
    }
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router(state.config())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `app` on `listener` until `shutdown` resolves
///
/// On shutdown every live session is closed with a going-away frame.
pub async fn serve<S>(
    listener: TcpListener,
    app: Router,
    state: &GatewayState,
    shutdown: S,
) -> Result<(), AppError>
where
    S: Future<Output = ()> + Send + 'static,
{
    let registry = state.registry().clone();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!(sessions = registry.len(), "Shutting down");
            registry.close_all(CloseCode::GoingAway).await;
        })
        .await
        .map_err(|e| AppError::Server(format!("Server error: {e}")))
}

/// Run the gateway server
pub async fn run_server(state: GatewayState) -> Result<(), AppError> {
    let addr = state.config().gateway.address();
    tracing::info!("Starting Gateway server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Server(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Gateway listening on ws://{}/ws", addr);

    let app = create_app(state.clone());
    serve(listener, app, &state, shutdown_signal()).await
}

/// Run the complete gateway server with configuration
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    config.ws.validate()?;
    if config.app.env.is_production() && config.ws.allowed_origins.is_empty() {
        tracing::warn!("No allowed origins configured, every Origin is accepted");
    }

    let state = GatewayState::new(config);
    run_server(state).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
