//! Subscriber installation
//!
//! `RUST_LOG` wins when set; otherwise the preset's level applies to the
//! gateway crates and HTTP tracing, with everything else held at `warn`.

use crate::config::Environment;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer,
};

/// Crates whose events follow the preset level
const GATEWAY_TARGETS: [&str; 3] = ["wsgate", "wsgate_common", "tower_http"];

/// Log output settings
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level for gateway targets when `RUST_LOG` is unset
    pub level: Level,
    /// Emit one JSON object per event
    pub json: bool,
    /// Log session and message span open/close
    pub span_events: bool,
    /// Attach source file and line to events
    pub source_location: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json: false,
            span_events: false,
            source_location: true,
        }
    }
}

impl TracingConfig {
    /// Debug level with span lifecycles, for local runs
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            span_events: true,
            ..Self::default()
        }
    }

    /// JSON lines without source locations
    #[must_use]
    pub fn production() -> Self {
        Self {
            json: true,
            source_location: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn for_environment(env: Environment) -> Self {
        match env {
            Environment::Development => Self::development(),
            Environment::Staging => Self::default(),
            Environment::Production => Self::production(),
        }
    }

    /// Filter used when `RUST_LOG` is not set
    fn default_directives(&self) -> String {
        let level = self.level.to_string().to_lowercase();
        std::iter::once("warn".to_string())
            .chain(GATEWAY_TARGETS.iter().map(|target| format!("{target}={level}")))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Install the subscriber with the default preset
pub fn try_init_tracing() -> Result<(), TracingError> {
    try_init_tracing_with_config(TracingConfig::default())
}

/// Install the subscriber; fails instead of panicking when one is already set
pub fn try_init_tracing_with_config(config: TracingConfig) -> Result<(), TracingError> {
    install(&config).map_err(|_| TracingError::AlreadyInitialized)
}

fn install(config: &TracingConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directives()));

    let base = fmt::layer()
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_span_events(config.span_events());

    let output = if config.json {
        base.json().boxed()
    } else {
        base.boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,
}
