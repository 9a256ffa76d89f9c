//! Gateway state
//!
//! Application state for the gateway server.

use crate::admission::AdmissionGate;
use crate::session::{SessionOptions, SessionRegistry};
use crate::upgrade::{allow_origins, OriginCheck};
use std::sync::Arc;
use wsgate_common::AppConfig;

/// Gateway application state
///
/// Holds all shared dependencies for the gateway server.
#[derive(Clone)]
pub struct GatewayState {
    /// Application configuration
    config: Arc<AppConfig>,
    /// Bounds concurrent sessions
    gate: AdmissionGate,
    /// Live sessions
    registry: SessionRegistry,
    /// Timers applied to every session
    options: Arc<SessionOptions>,
    /// Origin predicate for upgrades
    origin: OriginCheck,
}

impl GatewayState {
    /// Create a new gateway state from configuration
    pub fn new(config: AppConfig) -> Self {
        let gate = AdmissionGate::new(config.ws.max_connections);
        let options = SessionOptions::from(&config.ws);
        let origin = allow_origins(config.ws.allowed_origins.clone());

        Self {
            config: Arc::new(config),
            gate,
            registry: SessionRegistry::new(),
            options: Arc::new(options),
            origin,
        }
    }

    /// Replace the origin predicate
    pub fn with_origin_check(mut self, origin: OriginCheck) -> Self {
        self.origin = origin;
        self
    }

    /// Get the application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Get the admission gate
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Get the session registry
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn origin(&self) -> &OriginCheck {
        &self.origin
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("gate", &self.gate)
            .field("registry", &self.registry)
            .field("options", &self.options)
            .field("config", &"AppConfig")
            .finish()
    }
}
