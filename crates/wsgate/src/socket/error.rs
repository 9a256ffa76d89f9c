//! Transport error types

use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Failure reading from or writing to a socket
///
/// Every transport error is terminal for the pump that observes it.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The socket was closed locally or by the peer
    #[error("Socket closed")]
    Closed,

    /// No frame arrived before the read deadline
    #[error("Read deadline exceeded")]
    DeadlineExceeded,

    /// A write did not finish within the write wait
    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    /// A frame could not be expressed on the wire
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Error raised by the WebSocket library
    #[error("WebSocket error: {0}")]
    WebSocket(tungstenite::Error),
}

impl TransportError {
    /// Closure rather than a failure
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl From<tungstenite::Error> for TransportError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => Self::Closed,
            other => Self::WebSocket(other),
        }
    }
}
