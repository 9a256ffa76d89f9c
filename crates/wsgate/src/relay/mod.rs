//! Duplex relay
//!
//! Two pumps cross-wired between a client socket and an upstream socket.
//! Each forwards raw frames to the other side. Whichever stops first closes
//! both sockets, which unblocks the other pump's read.

mod dial;
mod forwarder;

pub use dial::dial;
pub use forwarder::Forwarder;

use crate::keepalive;
use crate::protocol::CloseCode;
use crate::pump::{self, PumpExit, PumpSide, RawDecoder};
use crate::session::{Session, SessionGuard, SessionRegistry, TeardownGuard};
use crate::socket::SocketReader;
use axum::http::HeaderMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;
use tracing::Instrument;
use wsgate_common::ResultEnvelope;

/// Relay failure
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Session has no upstream socket")]
    MissingPeer,

    #[error("Upstream dial timed out after {0:?}")]
    DialTimeout(Duration),

    #[error("Upstream dial failed: {0}")]
    Dial(#[from] tungstenite::Error),
}

impl RelayError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingPeer => "RELAY_MISCONFIGURED",
            Self::DialTimeout(_) | Self::Dial(_) => "UPSTREAM_UNAVAILABLE",
        }
    }

    #[must_use]
    pub fn to_envelope(&self) -> ResultEnvelope {
        ResultEnvelope::fail_with_code(self.error_code(), self.to_string())
    }
}

/// Dial `upstream_url` and relay the session to it
///
/// When the dial fails the client gets one error envelope and is closed.
pub async fn bridge(
    session: Arc<Session>,
    client_reader: SocketReader,
    upstream_url: &str,
    headers: &HeaderMap,
    dial_timeout: Duration,
    registry: &SessionRegistry,
) -> Result<PumpExit, RelayError> {
    let span = session.span().clone();

    let (peer, upstream_reader) = match dial(upstream_url, headers, dial_timeout)
        .instrument(span.clone())
        .await
    {
        Ok(pair) => pair,
        Err(e) => {
            async {
                tracing::warn!(error = %e, upstream = %upstream_url, "Upstream dial failed");
                if let Err(send_err) = session.send_envelope(&e.to_envelope()).await {
                    tracing::debug!(error = %send_err, "Failed to send dial error");
                }
                session.close(CloseCode::Error, "upstream unavailable").await;
            }
            .instrument(span)
            .await;
            return Err(e);
        }
    };

    session.set_peer(peer);
    relay(session, client_reader, upstream_reader, registry).await
}

/// Run both pumps of a relay until the session ends
///
/// The upstream pump is spawned; the client pump runs on the caller's task.
/// Returns the client pump's exit.
pub async fn relay(
    session: Arc<Session>,
    client_reader: SocketReader,
    upstream_reader: SocketReader,
    registry: &SessionRegistry,
) -> Result<PumpExit, RelayError> {
    let span = session.span().clone();
    let Some(peer) = session.peer() else {
        let err = RelayError::MissingPeer;
        async {
            tracing::error!(error = %err, "Relay started without upstream");
            session.close(CloseCode::Error, "relay misconfigured").await;
        }
        .instrument(span)
        .await;
        return Err(err);
    };
    let write_wait = session.deadlines().write_wait();

    let exit = async move {
        let _guard = SessionGuard::new(session.clone(), registry.clone());
        tracing::info!("Relay started");

        let keepalive = session
            .ping_period()
            .map(|period| keepalive::spawn(session.clone(), period));

        let upstream = {
            let session = session.clone();
            let forward = Forwarder::new(Arc::clone(session.socket()), write_wait);
            let side = PumpSide::upstream(Arc::clone(&peer), upstream_reader);
            let span = tracing::debug_span!(parent: session.span(), "upstream_pump");

            tokio::spawn(
                async move {
                    let _teardown = TeardownGuard(session.clone());
                    let exit = pump::run(&session, side, &RawDecoder, &forward).await;
                    session.close(exit.close_code(), exit.reason()).await;
                    exit
                }
                .instrument(span),
            )
        };

        let forward = Forwarder::new(peer, write_wait);
        let side = PumpSide::client(&session, client_reader);
        let exit = pump::run(&session, side, &RawDecoder, &forward).await;
        session.close(exit.close_code(), exit.reason()).await;

        if let Some(task) = keepalive {
            task.abort();
        }

        match upstream.await {
            Ok(upstream_exit) => tracing::debug!(exit = %upstream_exit, "Upstream pump stopped"),
            Err(e) => tracing::error!(error = %e, "Upstream pump panicked"),
        }

        tracing::info!(
            exit = %exit,
            messages = session.message_count(),
            duration_ms = session.age().as_millis() as u64,
            "Relay ended"
        );

        exit
    }
    .instrument(span)
    .await;

    Ok(exit)
}
