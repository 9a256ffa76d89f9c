//! Socket halves
//!
//! A live WebSocket is split into a shared write handle ([`Socket`]) and an
//! exclusively owned read half ([`SocketReader`]). Closing the write handle
//! signals the read half, which unblocks a read in progress on another task.

mod error;
mod tungstenite;

#[cfg(test)]
pub(crate) mod testing;

pub use error::TransportError;
pub use tungstenite::{open_stream, WsSink, WsSource};

use crate::protocol::Frame;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

/// Fallback bound for closing a socket when no write wait is configured
const CLOSE_WAIT: Duration = Duration::from_secs(1);

/// Read side of a WebSocket library connection
#[async_trait]
pub trait FrameSource: Send {
    /// Read the next complete frame
    ///
    /// A stream that ends yields the sentinel frame.
    async fn read_frame(&mut self) -> Result<Frame, TransportError>;

    /// Whether the library queues the pong for every ping it reads
    fn answers_pings(&self) -> bool {
        false
    }
}

/// Write side of a WebSocket library connection
#[async_trait]
pub trait FrameSink: Send {
    async fn write_frame(&mut self, frame: Frame) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Which end of a session a socket faces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketRole {
    Client,
    Upstream,
}

impl SocketRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Upstream => "upstream",
        }
    }
}

impl std::fmt::Display for SocketRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a connection into its shared write handle and its read half
pub fn open(
    source: impl FrameSource + 'static,
    sink: impl FrameSink + 'static,
    role: SocketRole,
) -> (Arc<Socket>, SocketReader) {
    let (close_tx, close_rx) = watch::channel(false);

    let socket = Arc::new(Socket {
        role,
        sink: Mutex::new(Box::new(sink)),
        closed: AtomicBool::new(false),
        close_signal: close_tx,
    });

    let reader = SocketReader {
        role,
        source: Box::new(source),
        closed: close_rx,
    };

    (socket, reader)
}

/// Shared write handle of one WebSocket
///
/// Writes are serialized through an async mutex. The underlying sink is
/// closed at most once.
pub struct Socket {
    role: SocketRole,
    sink: Mutex<Box<dyn FrameSink>>,
    closed: AtomicBool,
    close_signal: watch::Sender<bool>,
}

impl Socket {
    #[must_use]
    pub fn role(&self) -> SocketRole {
        self.role
    }

    /// Check if the socket has been closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Write one frame, bounded by `wait` when given
    pub async fn send(&self, frame: Frame, wait: Option<Duration>) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let write = async {
            let mut sink = self.sink.lock().await;
            sink.write_frame(frame).await
        };

        match wait {
            Some(wait) => tokio::time::timeout(wait, write)
                .await
                .map_err(|_| TransportError::WriteTimeout(wait))?,
            None => write.await,
        }
    }

    /// Close the socket, optionally writing a final frame first
    ///
    /// Returns `true` if this call performed the close. Readers are signalled
    /// before the sink is touched, so a blocked read returns immediately.
    pub async fn close(&self, last: Option<Frame>, wait: Option<Duration>) -> bool {
        if !self.mark_closed() {
            return false;
        }

        let wait = wait.unwrap_or(CLOSE_WAIT);
        let shutdown = async {
            let mut sink = self.sink.lock().await;
            if let Some(frame) = last {
                if let Err(e) = sink.write_frame(frame).await {
                    tracing::debug!(role = %self.role, error = %e, "Failed to write close frame");
                }
            }
            if let Err(e) = sink.close().await {
                tracing::debug!(role = %self.role, error = %e, "Failed to close socket cleanly");
            }
        };

        if tokio::time::timeout(wait, shutdown).await.is_err() {
            tracing::debug!(role = %self.role, "Socket close timed out");
        }

        true
    }

    /// Close without waiting
    ///
    /// Used from drop paths. Readers are signalled synchronously and the sink
    /// is closed on the runtime if one is available.
    pub fn abort(self: &Arc<Self>) {
        if !self.mark_closed() {
            return;
        }

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let socket = Arc::clone(self);
            handle.spawn(async move {
                let shutdown = async {
                    let mut sink = socket.sink.lock().await;
                    let _ = sink.close().await;
                };
                let _ = tokio::time::timeout(CLOSE_WAIT, shutdown).await;
            });
        }
    }

    fn mark_closed(&self) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.close_signal.send_replace(true);
        true
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("role", &self.role)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Exclusively owned read half of one WebSocket
pub struct SocketReader {
    role: SocketRole,
    source: Box<dyn FrameSource>,
    closed: watch::Receiver<bool>,
}

impl SocketReader {
    #[must_use]
    pub fn role(&self) -> SocketRole {
        self.role
    }

    /// Whether pings read here are already answered below this reader
    #[must_use]
    pub fn answers_pings(&self) -> bool {
        self.source.answers_pings()
    }

    /// Block until the next frame arrives
    ///
    /// Fails with [`TransportError::Closed`] as soon as the paired [`Socket`]
    /// is closed, and with [`TransportError::DeadlineExceeded`] once
    /// `deadline` passes.
    pub async fn read(&mut self, deadline: Option<Instant>) -> Result<Frame, TransportError> {
        let Self { source, closed, .. } = self;

        // A dropped sender counts as closed
        let signalled = async {
            while !*closed.borrow_and_update() {
                if closed.changed().await.is_err() {
                    break;
                }
            }
        };
        let read = async {
            match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, source.read_frame())
                    .await
                    .unwrap_or(Err(TransportError::DeadlineExceeded)),
                None => source.read_frame().await,
            }
        };

        tokio::select! {
            biased;
            () = signalled => Err(TransportError::Closed),
            result = read => result,
        }
    }
}

impl std::fmt::Debug for SocketReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketReader")
            .field("role", &self.role)
            .finish()
    }
}
