//! In-memory session store keyed by conversation.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;

use super::model::Session;

/// Keyed storage for in-flight registration sessions.
///
/// Sessions are ephemeral: nothing survives a restart.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current session for `user_id`, or a fresh idle one.
    pub async fn get(&self, user_id: &str) -> Session {
        self.sessions
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| Session::new(user_id))
    }

    /// Store `session` under its user id.
    pub async fn put(&self, mut session: Session) {
        session.updated_at = Utc::now();
        self.sessions
            .write()
            .await
            .insert(session.user_id.clone(), session);
    }

    /// Remove the session for `user_id`. Returns whether one existed.
    pub async fn clear(&self, user_id: &str) -> bool {
        self.sessions.write().await.remove(user_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions not updated within `max_idle`. Returns how many were
    /// removed.
    pub async fn prune_stale(&self, max_idle: Duration) -> usize {
        let max_idle = chrono::Duration::from_std(max_idle).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| now.signed_duration_since(s.updated_at) < max_idle);
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::info!(pruned, remaining = sessions.len(), "Pruned stale sessions");
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registration::model::{Draft, Role};
    use crate::registration::state::RegistrationState;

    #[tokio::test]
    async fn get_creates_fresh_idle_session() {
        let store = SessionStore::new();
        let session = store.get("telegram:1").await;
        assert_eq!(session.user_id, "telegram:1");
        assert_eq!(session.state, RegistrationState::Idle);
        assert!(session.draft.is_empty());
        // get alone does not insert
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn put_then_get_returns_stored_session() {
        let store = SessionStore::new();
        let mut session = store.get("telegram:1").await;
        session.state = RegistrationState::FounderName;
        session.draft = Draft::for_role(Role::Founder);
        store.put(session).await;

        let loaded = store.get("telegram:1").await;
        assert_eq!(loaded.state, RegistrationState::FounderName);
        assert_eq!(loaded.draft.role(), Some(Role::Founder));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn sessions_are_independent_per_user() {
        let store = SessionStore::new();
        let mut a = store.get("a").await;
        a.state = RegistrationState::ProgrammerAge;
        store.put(a).await;

        assert_eq!(store.get("b").await.state, RegistrationState::Idle);
        assert_eq!(store.get("a").await.state, RegistrationState::ProgrammerAge);
    }

    #[tokio::test]
    async fn clear_removes_session() {
        let store = SessionStore::new();
        let mut session = store.get("u").await;
        session.state = RegistrationState::ChoosingRole;
        store.put(session).await;

        assert!(store.clear("u").await);
        assert!(!store.clear("u").await);
        assert_eq!(store.get("u").await.state, RegistrationState::Idle);
    }

    #[tokio::test]
    async fn prune_stale_removes_only_old_sessions() {
        let store = SessionStore::new();
        let mut old = store.get("old").await;
        old.state = RegistrationState::ChoosingRole;
        store.put(old).await;
        {
            let mut sessions = store.sessions.write().await;
            if let Some(s) = sessions.get_mut("old") {
                s.updated_at = Utc::now() - chrono::Duration::hours(2);
            }
        }
        let mut fresh = store.get("fresh").await;
        fresh.state = RegistrationState::ChoosingRole;
        store.put(fresh).await;

        let pruned = store.prune_stale(Duration::from_secs(3600)).await;
        assert_eq!(pruned, 1);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("fresh").await.state, RegistrationState::ChoosingRole);
    }
}
