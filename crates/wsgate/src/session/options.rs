//! Session timing options

use std::time::Duration;
use wsgate_common::WsConfig;

/// Timers and tracing switches applied to every session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Bound on completing the protocol upgrade
    pub upgrade_timeout: Duration,
    /// Read-deadline window, pushed forward by every pong
    pub pong_wait: Option<Duration>,
    /// Bound on each individual frame write
    pub write_wait: Option<Duration>,
    /// Keepalive ping interval
    pub ping_period: Option<Duration>,
    /// Open a child span for every inbound frame
    pub trace_messages: bool,
}

impl SessionOptions {
    /// Options with every timer disabled
    #[must_use]
    pub fn untimed() -> Self {
        Self {
            upgrade_timeout: WsConfig::default().upgrade_timeout(),
            pong_wait: None,
            write_wait: None,
            ping_period: None,
            trace_messages: false,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&WsConfig::default())
    }
}

impl From<&WsConfig> for SessionOptions {
    fn from(config: &WsConfig) -> Self {
        Self {
            upgrade_timeout: config.upgrade_timeout(),
            pong_wait: config.pong_wait(),
            write_wait: config.write_wait(),
            ping_period: config.ping_period(),
            trace_messages: config.trace_messages,
        }
    }
}
