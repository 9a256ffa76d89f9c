//! Result envelope
//!
//! The `{success, message}` JSON shape written to clients on failures.

use serde::{Deserialize, Serialize};

/// Result envelope sent to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ResultEnvelope {
    /// Successful result with a message
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            code: None,
        }
    }

    /// Failure with a plain message
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            code: None,
        }
    }

    /// Failure carrying a machine-readable code
    #[must_use]
    pub fn fail_with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
