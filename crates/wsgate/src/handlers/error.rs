//! Handler error types

use crate::socket::TransportError;
use thiserror::Error;
use wsgate_common::ResultEnvelope;

/// Handler error type
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Invalid payload received
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Request refused by business logic, with a client-facing code
    #[error("{message}")]
    Rejected { code: String, message: String },

    /// Writing to a socket failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    /// Create a coded rejection
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Whether the pump must stop after this error
    ///
    /// Only transport failures end a pump; everything else is logged and the
    /// next frame is read.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Convert to the envelope written to the client
    #[must_use]
    pub fn to_envelope(&self) -> ResultEnvelope {
        match self {
            Self::Rejected { code, message } => ResultEnvelope::fail_with_code(code, message),
            other => ResultEnvelope::fail(other.to_string()),
        }
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
