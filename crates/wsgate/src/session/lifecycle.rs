//! Session lifecycle
//!
//! Drives one session from its start callback to teardown.

use super::{Session, SessionRegistry};
use crate::handlers::MessageHandler;
use crate::keepalive;
use crate::pump::{self, MessageDecoder, PumpExit, PumpSide};
use crate::socket::SocketReader;
use std::sync::Arc;
use tracing::Instrument;

/// Keeps a session registered while alive
///
/// Dropping the guard unregisters the session and aborts it, so sockets and
/// the admission permit are released even when a pump unwinds.
pub struct SessionGuard {
    session: Arc<Session>,
    registry: SessionRegistry,
}

impl SessionGuard {
    /// Register `session` for the lifetime of the guard
    pub fn new(session: Arc<Session>, registry: SessionRegistry) -> Self {
        registry.register(session.clone());
        Self { session, registry }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.remove(self.session.id());
        self.session.abort();
    }
}

/// Aborts a session if dropped before its owner finished cleanly
pub(crate) struct TeardownGuard(pub(crate) Arc<Session>);

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Serve one session with a single client pump
///
/// Runs the start callback, starts the keepalive, pumps client frames into
/// `handler` until a terminal condition and then closes the session.
pub async fn serve<D, H>(
    session: Arc<Session>,
    reader: SocketReader,
    decoder: &D,
    handler: &H,
    registry: &SessionRegistry,
) -> PumpExit
where
    D: MessageDecoder,
    H: MessageHandler<D::Message>,
{
    let span = session.span().clone();

    async move {
        let _guard = SessionGuard::new(session.clone(), registry.clone());
        tracing::info!("Session started");

        if let Err(e) = handler.on_start(&session).await {
            tracing::warn!(error = %e, "Session start rejected");
            if let Err(send_err) = session.send_envelope(&e.to_envelope()).await {
                tracing::debug!(error = %send_err, "Failed to send start error");
            }
            let exit = PumpExit::Rejected(e);
            session.close(exit.close_code(), exit.reason()).await;
            return exit;
        }

        let keepalive = session
            .ping_period()
            .map(|period| keepalive::spawn(session.clone(), period));

        let side = PumpSide::client(&session, reader);
        let exit = pump::run(&session, side, decoder, handler).await;

        if let Some(task) = keepalive {
            task.abort();
        }
        session.close(exit.close_code(), exit.reason()).await;

        tracing::info!(
            exit = %exit,
            messages = session.message_count(),
            duration_ms = session.age().as_millis() as u64,
            "Session ended"
        );

        exit
    }
    .instrument(span)
    .await
}
