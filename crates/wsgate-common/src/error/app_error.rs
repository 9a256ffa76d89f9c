//! Application error types
//!
//! Errors raised while starting and serving the gateway, plus the
//! pre-upgrade rejections that are answered with a plain HTTP status.

use super::ResultEnvelope;
use crate::config::ConfigError;
use std::fmt;

/// Application-wide error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Admission
    #[error("System busy, please retry later")]
    SystemBusy,

    // Handshake errors
    #[error("Websocket upgrade failed: {0}")]
    UpgradeFailed(String),

    #[error("Origin not allowed: {0}")]
    OriginRejected(String),

    // Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    // Server errors
    #[error("Server error: {0}")]
    Server(String),
}

impl AppError {
    /// Get HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::UpgradeFailed(_) => 400,

            // 403 Forbidden
            Self::OriginRejected(_) => 403,

            // 503 Service Unavailable
            Self::SystemBusy => 503,

            // 500 Internal Server Error
            Self::Config(_) | Self::Server(_) => 500,
        }
    }

    /// Get error code for result envelopes
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SystemBusy => "SYSTEM_BUSY",
            Self::UpgradeFailed(_) => "UPGRADE_FAILED",
            Self::OriginRejected(_) => "ORIGIN_REJECTED",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Server(_) => "SERVER_ERROR",
        }
    }

    /// Create an upgrade failure
    #[must_use]
    pub fn upgrade_failed(msg: impl fmt::Display) -> Self {
        Self::UpgradeFailed(msg.to_string())
    }
}

impl From<&AppError> for ResultEnvelope {
    fn from(err: &AppError) -> Self {
        ResultEnvelope::fail_with_code(err.error_code(), err.to_string())
    }
}
