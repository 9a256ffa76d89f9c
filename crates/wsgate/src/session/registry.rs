//! Session registry
//!
//! Tracks live sessions for health reporting and shutdown.

use super::Session;
use crate::protocol::CloseCode;
use dashmap::DashMap;
use std::sync::Arc;

/// Live sessions by ID
///
/// Uses `DashMap` for concurrent access from every session task.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session
    pub fn register(&self, session: Arc<Session>) {
        let id = session.id().to_string();
        self.sessions.insert(id.clone(), session);

        tracing::debug!(session_id = %id, "Session registered");
    }

    /// Remove a session
    pub fn remove(&self, session_id: &str) -> Option<Arc<Session>> {
        let removed = self.sessions.remove(session_id).map(|(_, session)| session);
        if removed.is_some() {
            tracing::debug!(session_id = %session_id, "Session removed");
        }
        removed
    }

    /// Get a session by ID
    pub fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.get(session_id).map(|r| r.clone())
    }

    /// Get the number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Get all session IDs
    pub fn ids(&self) -> Vec<String> {
        self.sessions.iter().map(|r| r.key().clone()).collect()
    }

    /// Close every live session with `code`
    ///
    /// Returns the number of sessions closed.
    pub async fn close_all(&self, code: CloseCode) -> usize {
        // Snapshot first so no shard lock is held across an await
        let sessions: Vec<Arc<Session>> = self.sessions.iter().map(|r| r.value().clone()).collect();
        let count = sessions.len();

        futures::future::join_all(
            sessions
                .iter()
                .map(|session| session.close(code, code.description())),
        )
        .await;

        tracing::info!(count = count, code = %code, "Closed all sessions");

        count
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .finish()
    }
}
