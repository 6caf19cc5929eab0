use super::session::{Session, SessionToken};
use crate::domain::CurrentUser;
use async_trait::async_trait;
use shared::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

/// Trait for session storage operations
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a new session for the given user with the specified TTL
    async fn create_session(&self, user: CurrentUser, ttl: Duration) -> Result<Session>;

    /// Get a live session by token; `NotFound` if unknown or expired
    async fn get_session(&self, token: &SessionToken) -> Result<Session>;

    /// Delete a session (logout)
    async fn delete_session(&self, token: &SessionToken) -> Result<bool>;

    /// Delete every session held by a user
    async fn delete_user_sessions(&self, user_id: &str) -> Result<usize>;
}

/// Session store service used by the HTTP layer to issue and resolve bearer tokens.
pub struct SessionStore {
    repository: Arc<dyn SessionRepository>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(repository: Arc<dyn SessionRepository>, ttl: Duration) -> Self {
        Self { repository, ttl }
    }

    pub async fn issue(&self, user: CurrentUser) -> Result<Session> {
        if user.user_id.trim().is_empty() || user.username.trim().is_empty() {
            return Err(Error::InvalidInput(
                "user_id and username are required".into(),
            ));
        }
        self.repository.create_session(user, self.ttl).await
    }

    /// Resolve a bearer token to the caller's identity.
    pub async fn validate(&self, token: &SessionToken) -> Result<CurrentUser> {
        match self.repository.get_session(token).await {
            Ok(session) => Ok(session.user),
            Err(Error::NotFound) => Err(Error::Unauthorized),
            Err(e) => Err(e),
        }
    }

    pub async fn invalidate(&self, token: &SessionToken) -> Result<bool> {
        self.repository.delete_session(token).await
    }

    /// Logout on every device.
    pub async fn invalidate_user(&self, user_id: &str) -> Result<usize> {
        self.repository.delete_user_sessions(user_id).await
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").field("ttl", &self.ttl).finish()
    }
}
