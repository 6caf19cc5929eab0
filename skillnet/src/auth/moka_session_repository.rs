use super::session::{Session, SessionToken, generate_session_token};
use super::session_store::SessionRepository;
use crate::domain::CurrentUser;
use async_trait::async_trait;
use moka::future::Cache;
use shared::{Error, Result};
use std::time::Duration;

/// Moka-based in-memory session repository
pub struct MokaSessionRepository {
    sessions: Cache<SessionToken, Session>,
}

impl MokaSessionRepository {
    /// Create a session repository with optional capacity; entries are evicted
    /// by moka after `max_ttl` regardless of the per-session TTL.
    pub fn new(max_sessions: Option<u64>, max_ttl: Duration) -> Self {
        let mut builder = Cache::builder().time_to_live(max_ttl);
        if let Some(capacity) = max_sessions {
            builder = builder.max_capacity(capacity);
        }

        Self {
            sessions: builder.build(),
        }
    }
}

#[async_trait]
impl SessionRepository for MokaSessionRepository {
    async fn create_session(&self, user: CurrentUser, ttl: Duration) -> Result<Session> {
        let token = generate_session_token();
        let session = Session::new(token.clone(), user, ttl);

        self.sessions.insert(token, session.clone()).await;
        tracing::debug!("Issued session for user '{}'", session.user.user_id);

        Ok(session)
    }

    async fn get_session(&self, token: &SessionToken) -> Result<Session> {
        let mut session = self.sessions.get(token).await.ok_or(Error::NotFound)?;

        if session.is_expired() {
            self.sessions.invalidate(token).await;
            return Err(Error::NotFound);
        }

        session.touch();
        self.sessions.insert(token.clone(), session.clone()).await;

        Ok(session)
    }

    async fn delete_session(&self, token: &SessionToken) -> Result<bool> {
        Ok(self.sessions.remove(token).await.is_some())
    }

    async fn delete_user_sessions(&self, user_id: &str) -> Result<usize> {
        let tokens: Vec<SessionToken> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.user.user_id == user_id)
            .map(|(token, _)| (*token).clone())
            .collect();

        let mut count = 0;
        for token in tokens {
            if self.sessions.remove(&token).await.is_some() {
                count += 1;
            }
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionStore;
    use std::sync::Arc;

    fn repository() -> MokaSessionRepository {
        MokaSessionRepository::new(None, Duration::from_secs(3600))
    }

    fn user(id: &str) -> CurrentUser {
        CurrentUser {
            user_id: id.to_string(),
            username: format!("{id}_name"),
        }
    }

    #[tokio::test]
    async fn test_create_and_validate_session() {
        let repo = repository();

        let session = repo
            .create_session(user("alice"), Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(!session.token.is_empty());

        let retrieved = repo.get_session(&session.token).await.unwrap();
        assert_eq!(retrieved.user, user("alice"));
    }

    #[tokio::test]
    async fn test_delete_session() {
        let repo = repository();
        let session = repo
            .create_session(user("alice"), Duration::from_secs(3600))
            .await
            .unwrap();

        assert!(repo.delete_session(&session.token).await.unwrap());
        assert!(matches!(
            repo.get_session(&session.token).await,
            Err(Error::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let repo = repository();
        let session = repo
            .create_session(user("alice"), Duration::ZERO)
            .await
            .unwrap();

        assert!(repo.get_session(&session.token).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_user_sessions_leaves_other_users() {
        let repo = repository();
        let ttl = Duration::from_secs(3600);

        repo.create_session(user("alice"), ttl).await.unwrap();
        repo.create_session(user("alice"), ttl).await.unwrap();
        let bob = repo.create_session(user("bob"), ttl).await.unwrap();

        assert_eq!(repo.delete_user_sessions("alice").await.unwrap(), 2);
        assert!(repo.get_session(&bob.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_store_maps_unknown_token_to_unauthorized() {
        let store = SessionStore::new(
            Arc::new(repository()),
            Duration::from_secs(60),
        );

        let session = store.issue(user("alice")).await.unwrap();
        assert_eq!(store.validate(&session.token).await.unwrap(), user("alice"));

        let err = store.validate(&"nope".to_string()).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized));
    }

    #[tokio::test]
    async fn test_store_rejects_blank_identity() {
        let store = SessionStore::new(
            Arc::new(repository()),
            Duration::from_secs(60),
        );
        let blank = CurrentUser {
            user_id: " ".into(),
            username: "x".into(),
        };
        assert!(matches!(
            store.issue(blank).await,
            Err(Error::InvalidInput(_))
        ));
    }
}
