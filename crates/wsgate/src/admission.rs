//! Admission control
//!
//! Bounds the number of concurrent sessions with a non-blocking permit pool.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting gate in front of session creation
///
/// A limit of 0 disables the gate: every entry succeeds.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Option<Arc<Semaphore>>,
    limit: usize,
}

impl AdmissionGate {
    /// Create a gate admitting at most `limit` concurrent sessions
    ///
    /// Limits above the permit pool's capacity are capped to it.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.min(Semaphore::MAX_PERMITS);
        let semaphore = (limit > 0).then(|| Arc::new(Semaphore::new(limit)));
        Self { semaphore, limit }
    }

    /// Create a gate that admits everything
    #[must_use]
    pub fn unlimited() -> Self {
        Self::new(0)
    }

    /// Try to take a permit without waiting
    ///
    /// Returns `None` when every permit is held. The permit is returned to
    /// the pool when dropped.
    #[must_use]
    pub fn try_enter(&self) -> Option<AdmissionPermit> {
        match &self.semaphore {
            Some(semaphore) => semaphore
                .clone()
                .try_acquire_owned()
                .ok()
                .map(|permit| AdmissionPermit {
                    permit: Some(permit),
                }),
            None => Some(AdmissionPermit { permit: None }),
        }
    }

    /// Configured limit (0 = unlimited)
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Permits currently free, or `None` when the gate is disabled
    #[must_use]
    pub fn available(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|s| s.available_permits())
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.semaphore.is_some()
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// One admitted session's claim on the gate
#[derive(Debug)]
#[must_use = "dropping the permit releases it immediately"]
pub struct AdmissionPermit {
    permit: Option<OwnedSemaphorePermit>,
}

impl AdmissionPermit {
    /// Give the permit back
    pub fn release(self) {
        drop(self);
    }

    /// Whether this permit counts against a limit
    #[must_use]
    pub fn is_limited(&self) -> bool {
        self.permit.is_some()
    }
}
