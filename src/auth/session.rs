//! In-memory session store (spec §4.9). Sessions are created on successful
//! `authenticate` and swept by a periodic background task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::token::Role;
use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub user_id: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
    session_timeout: chrono::Duration,
    cleanup_handle: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    cancel: tokio::sync::Mutex<Option<tokio_util::sync::CancellationToken>>,
}

impl SessionStore {
    pub fn new(session_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            session_timeout: chrono::Duration::from_std(session_timeout).unwrap_or(chrono::Duration::hours(1)),
            cleanup_handle: tokio::sync::Mutex::new(None),
            cancel: tokio::sync::Mutex::new(None),
        })
    }

    pub fn create_session(&self, user_id: &str, role: Role) -> Result<Session> {
        if user_id.trim().is_empty() {
            return Err(AppError::BadRequest("user id cannot be empty".to_string()));
        }
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            role,
            created_at: now,
            last_activity: now,
            expires_at: now + self.session_timeout,
        };
        self.sessions.write().insert(session.id, session.clone());
        Ok(session)
    }

    /// Returns the session if present and non-expired, bumping its
    /// last-activity timestamp. Always rechecks expiry under the lock so a
    /// session that expires concurrently with the cleanup sweep is never
    /// handed back as valid.
    pub fn validate_session(&self, id: Uuid) -> Result<Session> {
        let mut sessions = self.sessions.write();
        let Some(session) = sessions.get_mut(&id) else {
            return Err(AppError::Unauthorized);
        };
        if session.is_expired() {
            sessions.remove(&id);
            return Err(AppError::Unauthorized);
        }
        session.last_activity = Utc::now();
        Ok(session.clone())
    }

    pub fn get_session_by_user_id(&self, user_id: &str) -> Vec<Session> {
        self.sessions
            .read()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn invalidate_user_sessions(&self, user_id: &str) {
        self.sessions.write().retain(|_, s| s.user_id != user_id);
    }

    pub fn invalidate_session(&self, id: Uuid) {
        self.sessions.write().remove(&id);
    }

    fn sweep_expired(&self) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired());
        before - sessions.len()
    }

    pub async fn start_cleanup(self: &Arc<Self>, interval: Duration) -> Result<()> {
        let mut handle_guard = self.cleanup_handle.lock().await;
        if handle_guard.is_some() {
            return Err(AppError::AlreadyRunning);
        }
        let token = tokio_util::sync::CancellationToken::new();
        let store = Arc::clone(self);
        let child = token.child_token();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = store.sweep_expired();
                        if evicted > 0 {
                            tracing::debug!(evicted, "swept expired sessions");
                        }
                    }
                }
            }
        });
        *handle_guard = Some(handle);
        *self.cancel.lock().await = Some(token);
        Ok(())
    }

    pub async fn stop_cleanup(&self) {
        if let Some(token) = self.cancel.lock().await.take() {
            token.cancel();
        }
        if let Some(handle) = self.cleanup_handle.lock().await.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_session_rejects_empty_user_id() {
        let store = SessionStore::new(Duration::from_secs(60));
        assert!(store.create_session("", Role::Viewer).is_err());
    }

    #[test]
    fn validate_session_returns_session_and_bumps_activity() {
        let store = SessionStore::new(Duration::from_secs(60));
        let session = store.create_session("alice", Role::Operator).unwrap();
        let validated = store.validate_session(session.id).unwrap();
        assert_eq!(validated.user_id, "alice");
    }

    #[test]
    fn validate_session_rejects_unknown_id() {
        let store = SessionStore::new(Duration::from_secs(60));
        assert!(store.validate_session(Uuid::new_v4()).is_err());
    }

    #[test]
    fn invalidate_user_sessions_removes_all_of_them() {
        let store = SessionStore::new(Duration::from_secs(60));
        store.create_session("bob", Role::Viewer).unwrap();
        store.create_session("bob", Role::Viewer).unwrap();
        store.invalidate_user_sessions("bob");
        assert!(store.get_session_by_user_id("bob").is_empty());
    }

    #[test]
    fn session_ids_are_unique_across_many_creations() {
        let store = SessionStore::new(Duration::from_secs(60));
        let mut ids = std::collections::HashSet::new();
        for _ in 0..1000 {
            let session = store.create_session("carol", Role::Viewer).unwrap();
            assert!(ids.insert(session.id));
        }
    }

    #[tokio::test]
    async fn cleanup_cannot_start_twice() {
        let store = SessionStore::new(Duration::from_secs(60));
        store.start_cleanup(Duration::from_secs(3600)).await.unwrap();
        assert!(store.start_cleanup(Duration::from_secs(3600)).await.is_err());
        store.stop_cleanup().await;
    }
}
