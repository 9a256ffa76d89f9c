//! WebSocket close codes
//!
//! The RFC 6455 status codes the gateway sends when it ends a session.

use serde::{Deserialize, Serialize};

/// Close status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum CloseCode {
    /// Normal closure
    Normal = 1000,
    /// Server is shutting down
    GoingAway = 1001,
    /// Protocol violation
    Protocol = 1002,
    /// Data frame could not be decoded
    Unsupported = 1003,
    /// Payload failed validation
    Invalid = 1007,
    /// Session rejected by policy (start failure)
    Policy = 1008,
    /// Unexpected server condition
    Error = 1011,
}

impl CloseCode {
    /// Create a `CloseCode` from a raw u16 value
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1000 => Some(Self::Normal),
            1001 => Some(Self::GoingAway),
            1002 => Some(Self::Protocol),
            1003 => Some(Self::Unsupported),
            1007 => Some(Self::Invalid),
            1008 => Some(Self::Policy),
            1011 => Some(Self::Error),
            _ => None,
        }
    }

    /// Get the raw u16 value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Get a description of this close code
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Normal => "Normal closure",
            Self::GoingAway => "Server going away",
            Self::Protocol => "Protocol error",
            Self::Unsupported => "Unsupported data",
            Self::Invalid => "Invalid payload",
            Self::Policy => "Policy violation",
            Self::Error => "Internal error",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_u16())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}
