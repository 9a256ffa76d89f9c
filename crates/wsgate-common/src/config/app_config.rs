//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: ServerConfig,
    pub ws: WsConfig,
    pub relay: RelayConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse an environment name, case-insensitively
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Server bind configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// WebSocket session configuration
///
/// Every `*_ms` value of 0 disables the corresponding timer.
#[derive(Debug, Clone, Deserialize)]
pub struct WsConfig {
    /// Maximum concurrent sessions (0 = unlimited)
    #[serde(default)]
    pub max_connections: usize,
    #[serde(default = "default_upgrade_timeout_ms")]
    pub upgrade_timeout_ms: u64,
    #[serde(default = "default_pong_wait_ms")]
    pub pong_wait_ms: u64,
    #[serde(default = "default_write_wait_ms")]
    pub write_wait_ms: u64,
    #[serde(default = "default_ping_period_ms")]
    pub ping_period_ms: u64,
    /// Open a span for every inbound frame
    #[serde(default)]
    pub trace_messages: bool,
    /// Origins allowed to upgrade (empty = allow all)
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// Query parameter carrying the business identifier used for log correlation
    #[serde(default)]
    pub biz_key: Option<String>,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            max_connections: 0,
            upgrade_timeout_ms: default_upgrade_timeout_ms(),
            pong_wait_ms: default_pong_wait_ms(),
            write_wait_ms: default_write_wait_ms(),
            ping_period_ms: default_ping_period_ms(),
            trace_messages: false,
            allowed_origins: Vec::new(),
            biz_key: None,
        }
    }
}

impl WsConfig {
    /// Handshake timeout; falls back to the default when configured as 0
    #[must_use]
    pub fn upgrade_timeout(&self) -> Duration {
        if self.upgrade_timeout_ms == 0 {
            Duration::from_millis(default_upgrade_timeout_ms())
        } else {
            Duration::from_millis(self.upgrade_timeout_ms)
        }
    }

    #[must_use]
    pub fn pong_wait(&self) -> Option<Duration> {
        non_zero_millis(self.pong_wait_ms)
    }

    #[must_use]
    pub fn write_wait(&self) -> Option<Duration> {
        non_zero_millis(self.write_wait_ms)
    }

    #[must_use]
    pub fn ping_period(&self) -> Option<Duration> {
        non_zero_millis(self.ping_period_ms)
    }

    /// Check that the timers are consistent with each other
    ///
    /// A ping period at or above the pong wait would let every idle
    /// session expire before the next ping is sent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections > MAX_CONNECTIONS {
            return Err(ConfigError::InvalidValue(
                "WS_MAX_CONNECTIONS",
                format!(
                    "{} exceeds the largest supported limit {MAX_CONNECTIONS}",
                    self.max_connections
                ),
            ));
        }
        if let (Some(ping), Some(pong)) = (self.ping_period(), self.pong_wait()) {
            if ping >= pong {
                return Err(ConfigError::InvalidValue(
                    "WS_PING_PERIOD_MS",
                    format!(
                        "ping period {}ms must be shorter than pong wait {}ms",
                        ping.as_millis(),
                        pong.as_millis()
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Largest admission limit; the permit pool cannot hold more
pub const MAX_CONNECTIONS: usize = usize::MAX >> 3;

/// Upstream relay configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayConfig {
    /// Upstream WebSocket URL; the relay route is disabled when absent
    #[serde(default)]
    pub upstream_url: Option<String>,
}

// Default value functions
fn default_app_name() -> String {
    "wsgate".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_upgrade_timeout_ms() -> u64 {
    5_000
}

fn default_pong_wait_ms() -> u64 {
    60_000
}

fn default_write_wait_ms() -> u64 {
    10_000
}

fn default_ping_period_ms() -> u64 {
    (default_pong_wait_ms() * 9) / 10
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_source(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &'static str| -> Result<Option<u64>, ConfigError> {
            lookup(key)
                .map(|s| {
                    s.trim()
                        .parse::<u64>()
                        .map_err(|e| ConfigError::InvalidValue(key, e.to_string()))
                })
                .transpose()
        };

        let pong_wait_ms = parsed("WS_PONG_WAIT_MS")?.unwrap_or_else(default_pong_wait_ms);

        let ws = WsConfig {
            max_connections: parsed("WS_MAX_CONNECTIONS")?.unwrap_or(0) as usize,
            upgrade_timeout_ms: parsed("WS_UPGRADE_TIMEOUT_MS")?
                .unwrap_or_else(default_upgrade_timeout_ms),
            pong_wait_ms,
            write_wait_ms: parsed("WS_WRITE_WAIT_MS")?.unwrap_or_else(default_write_wait_ms),
            ping_period_ms: parsed("WS_PING_PERIOD_MS")?.unwrap_or((pong_wait_ms * 9) / 10),
            trace_messages: lookup("WS_TRACE_MESSAGES")
                .is_some_and(|s| matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes")),
            allowed_origins: lookup("WS_ALLOWED_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            biz_key: lookup("WS_BIZ_KEY").filter(|s| !s.trim().is_empty()),
        };
        ws.validate()?;

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: lookup("APP_ENV")
                    .and_then(|s| Environment::from_name(&s))
                    .unwrap_or_default(),
            },
            gateway: ServerConfig {
                host: lookup("GATEWAY_HOST").unwrap_or_else(default_host),
                port: lookup("GATEWAY_PORT")
                    .and_then(|s| s.parse().ok())
                    .ok_or(ConfigError::MissingVar("GATEWAY_PORT"))?,
            },
            ws,
            relay: RelayConfig {
                upstream_url: lookup("RELAY_UPSTREAM_URL").filter(|s| !s.trim().is_empty()),
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
