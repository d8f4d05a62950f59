//! Live WebSocket session registry.
//!
//! Tracks connected sessions for `/stats`, connection limits and shutdown.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

pub type SessionId = String;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("session '{0}' is already connected")]
    Duplicate(SessionId),
    #[error("connection limit of {0} reached")]
    Full(usize),
}

#[derive(Debug, Clone)]
struct Entry {
    user_id: Option<String>,
    connected_at: DateTime<Utc>,
    shutdown: CancellationToken,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub user_id: Option<String>,
    pub connected_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionId, Entry>>>,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_sessions,
        }
    }

    /// Register a new session. `shutdown` is cancelled by [`Self::shutdown_all`].
    pub async fn register(
        &self,
        session_id: SessionId,
        user_id: Option<String>,
        shutdown: CancellationToken,
    ) -> Result<(), RegistryError> {
        let mut w = self.sessions.write().await;
        if w.contains_key(&session_id) {
            return Err(RegistryError::Duplicate(session_id));
        }
        if w.len() >= self.max_sessions {
            return Err(RegistryError::Full(self.max_sessions));
        }
        w.insert(
            session_id,
            Entry {
                user_id,
                connected_at: Utc::now(),
                shutdown,
            },
        );
        Ok(())
    }

    pub async fn unregister(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn list(&self) -> Vec<SessionSummary> {
        let r = self.sessions.read().await;
        let mut list: Vec<SessionSummary> = r
            .iter()
            .map(|(id, e)| SessionSummary {
                session_id: id.clone(),
                user_id: e.user_id.clone(),
                connected_at: e.connected_at,
            })
            .collect();
        list.sort_by_key(|s| s.connected_at);
        list
    }

    /// Ask every live session to close.
    pub async fn shutdown_all(&self) -> usize {
        let r = self.sessions.read().await;
        for entry in r.values() {
            entry.shutdown.cancel();
        }
        r.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refuses_duplicates_and_overflow() {
        let registry = SessionRegistry::new(2);
        registry.register("a".into(), None, CancellationToken::new()).await.unwrap();
        assert_eq!(
            registry.register("a".into(), None, CancellationToken::new()).await,
            Err(RegistryError::Duplicate("a".into()))
        );
        registry.register("b".into(), Some("u1".into()), CancellationToken::new()).await.unwrap();
        assert_eq!(
            registry.register("c".into(), None, CancellationToken::new()).await,
            Err(RegistryError::Full(2))
        );

        assert!(registry.unregister("a").await);
        assert!(!registry.unregister("a").await);
        assert_eq!(registry.count().await, 1);
        assert_eq!(registry.list().await[0].user_id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn shutdown_cancels_every_session() {
        let registry = SessionRegistry::new(8);
        let a = CancellationToken::new();
        let b = CancellationToken::new();
        registry.register("a".into(), None, a.clone()).await.unwrap();
        registry.register("b".into(), None, b.clone()).await.unwrap();

        assert_eq!(registry.shutdown_all().await, 2);
        assert!(a.is_cancelled() && b.is_cancelled());
    }
}
