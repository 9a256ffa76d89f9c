//! Individual WebSocket session
//!
//! Represents one accepted connection from upgrade to teardown.

use super::{Deadlines, SessionOptions};
use crate::admission::AdmissionPermit;
use crate::protocol::{CloseCode, Frame};
use crate::socket::{Socket, TransportError};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Span;
use wsgate_common::ResultEnvelope;

/// Session state
///
/// Transitions only move forward: `Open` → `Ending` → `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[repr(u8)]
pub enum SessionState {
    /// Pumps are running
    Open = 0,
    /// A pump observed a terminal condition
    Ending = 1,
    /// Sockets closed and permit released
    Closed = 2,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Open,
            1 => Self::Ending,
            _ => Self::Closed,
        }
    }
}

/// Business identifier used for log correlation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BizTag {
    pub key: String,
    pub id: String,
}

impl BizTag {
    #[must_use]
    pub fn new(key: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            id: id.into(),
        }
    }
}

/// A single WebSocket session
pub struct Session {
    /// Unique session ID
    id: String,

    /// Business identifier, if the route resolved one
    biz: Option<BizTag>,

    /// Client socket
    socket: Arc<Socket>,

    /// Upstream socket (relay mode only)
    peer: RwLock<Option<Arc<Socket>>>,

    /// Current `SessionState` as u8
    state: AtomicU8,

    /// Whether the end callback has been claimed
    end_claimed: AtomicBool,

    /// Read/write deadlines
    deadlines: Deadlines,

    /// Admission permit, taken exactly once at teardown
    permit: Mutex<Option<AdmissionPermit>>,

    /// Parent span for everything this session logs
    span: Span,

    /// Keepalive interval
    ping_period: Option<Duration>,

    /// Open a span per inbound frame
    trace_messages: bool,

    /// Data frames dispatched successfully
    messages: AtomicU64,

    /// Session creation time
    created_at: Instant,
}

impl Session {
    /// Create a session over an upgraded client socket
    pub fn new(socket: Arc<Socket>, permit: AdmissionPermit, options: &SessionOptions) -> Self {
        let id = Self::generate_id();
        let span = tracing::info_span!(
            "ws_session",
            session_id = %id,
            biz_key = tracing::field::Empty,
            biz_id = tracing::field::Empty,
        );

        Self {
            id,
            biz: None,
            socket,
            peer: RwLock::new(None),
            state: AtomicU8::new(SessionState::Open as u8),
            end_claimed: AtomicBool::new(false),
            deadlines: Deadlines::new(options.pong_wait, options.write_wait),
            permit: Mutex::new(Some(permit)),
            span,
            ping_period: options.ping_period,
            trace_messages: options.trace_messages,
            messages: AtomicU64::new(0),
            created_at: Instant::now(),
        }
    }

    /// Attach the business identifier
    pub fn with_biz(mut self, biz: Option<BizTag>) -> Self {
        if let Some(tag) = &biz {
            self.span.record("biz_key", tag.key.as_str());
            self.span.record("biz_id", tag.id.as_str());
        }
        self.biz = biz;
        self
    }

    /// Generate a new session ID
    #[must_use]
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Get the session ID
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn biz(&self) -> Option<&BizTag> {
        self.biz.as_ref()
    }

    /// Get the client socket
    pub fn socket(&self) -> &Arc<Socket> {
        &self.socket
    }

    pub fn deadlines(&self) -> &Deadlines {
        &self.deadlines
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn ping_period(&self) -> Option<Duration> {
        self.ping_period
    }

    pub fn trace_messages(&self) -> bool {
        self.trace_messages
    }

    /// Set the upstream socket
    pub fn set_peer(&self, socket: Arc<Socket>) {
        *self.peer.write() = Some(socket);
    }

    /// Get the upstream socket
    pub fn peer(&self) -> Option<Arc<Socket>> {
        self.peer.read().clone()
    }

    /// Get the current state
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Check if a terminal condition has been observed
    pub fn is_ended(&self) -> bool {
        self.state() != SessionState::Open
    }

    /// Mark the session as ending
    ///
    /// Returns `true` if this call moved the session out of `Open`.
    pub fn set_ended(&self) -> bool {
        self.advance(SessionState::Ending) == SessionState::Open
    }

    /// Claim the right to run the end callback; succeeds once per session
    pub fn claim_end_callback(&self) -> bool {
        !self.end_claimed.swap(true, Ordering::AcqRel)
    }

    /// Count a dispatched message
    pub fn record_message(&self) -> u64 {
        self.messages.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Data frames dispatched so far
    pub fn message_count(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    /// Get session age
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Send a frame to the client
    pub async fn send(&self, frame: Frame) -> Result<(), TransportError> {
        self.socket.send(frame, self.deadlines.write_wait()).await
    }

    /// Send a result envelope to the client as one text frame
    pub async fn send_envelope(&self, envelope: &ResultEnvelope) -> Result<(), TransportError> {
        let json = envelope
            .to_json()
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        self.send(Frame::text(json)).await
    }

    /// Close both sockets and release the admission permit
    ///
    /// Safe to call from every pump; only the first call closes each socket.
    pub async fn close(&self, code: CloseCode, reason: &str) {
        self.set_ended();

        let wait = self.deadlines.write_wait();
        let client = self.socket.close(Some(Frame::close(code, reason)), wait);

        match self.peer() {
            Some(peer) => {
                let upstream = peer.close(Some(Frame::close(code, reason)), wait);
                tokio::join!(client, upstream);
            }
            None => {
                client.await;
            }
        }

        self.finish();
    }

    /// Close everything without waiting
    ///
    /// Used when a pump unwinds without reaching its normal teardown.
    pub fn abort(&self) {
        if self.state() == SessionState::Closed {
            return;
        }

        self.set_ended();
        self.socket.abort();
        if let Some(peer) = self.peer() {
            peer.abort();
        }
        self.finish();
    }

    fn finish(&self) {
        if let Some(permit) = self.permit.lock().take() {
            permit.release();
        }
        self.advance(SessionState::Closed);
    }

    fn advance(&self, to: SessionState) -> SessionState {
        SessionState::from_u8(self.state.fetch_max(to as u8, Ordering::AcqRel))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("biz", &self.biz)
            .field("state", &self.state())
            .field("messages", &self.message_count())
            .finish()
    }
}
