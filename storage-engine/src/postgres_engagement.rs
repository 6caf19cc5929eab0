//! Postgres-backed engagement store: the authoritative like and comment rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{Error, Result};
use skillnet::domain::{Comment, CommentId, Like, PostId, PostOwner};
use skillnet::ports::EngagementStore;
use sqlx::postgres::{PgPool, PgPoolOptions};

pub fn map_sqlx_error(err: sqlx::Error) -> Error {
    match err {
        sqlx::Error::RowNotFound => Error::NotFound,
        sqlx::Error::Database(db) if db.message().contains("duplicate key") => {
            Error::Conflict(format!(
                "duplicate entry ({})",
                db.constraint().unwrap_or("unknown")
            ))
        }
        sqlx::Error::Database(db) if db.message().contains("violates foreign key constraint") => {
            Error::NotFound
        }
        other => Error::store(other),
    }
}

fn to_db_id(id: u64) -> Result<i64> {
    i64::try_from(id).map_err(|_| Error::InvalidInput(format!("id {id} is out of range")))
}

fn from_db_id(id: i64) -> Result<u64> {
    u64::try_from(id).map_err(|_| Error::Store(format!("negative id {id} in database")))
}

fn from_db_count(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

#[derive(Clone)]
pub struct PostgresEngagementStore {
    pool: PgPool,
}

impl PostgresEngagementStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(Error::store)?;
        Ok(Self::new(pool))
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(Error::store)
    }
}

#[async_trait]
impl EngagementStore for PostgresEngagementStore {
    async fn create_post(&self, user_id: &str) -> Result<PostOwner> {
        let id: i64 = sqlx::query_scalar("INSERT INTO posts (user_id) VALUES ($1) RETURNING id")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(PostOwner {
            post_id: from_db_id(id)?,
            user_id: user_id.to_string(),
        })
    }

    async fn create_like(&self, user_id: &str, post_id: PostId) -> Result<Like> {
        let created_at: DateTime<Utc> = sqlx::query_scalar(
            "INSERT INTO likes (user_id, post_id) VALUES ($1, $2) RETURNING created_at",
        )
        .bind(user_id)
        .bind(to_db_id(post_id)?)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match map_sqlx_error(e) {
            Error::Conflict(_) => Error::Conflict("post already liked".into()),
            other => other,
        })?;

        Ok(Like {
            user_id: user_id.to_string(),
            post_id,
            created_at,
        })
    }

    async fn delete_like(&self, user_id: &str, post_id: PostId) -> Result<()> {
        let result = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(to_db_id(post_id)?)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    async fn create_comment(&self, user_id: &str, post_id: PostId, text: &str) -> Result<Comment> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("comment text must not be empty".into()));
        }

        let (id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
            "INSERT INTO comments (post_id, user_id, text) VALUES ($1, $2, $3) \
             RETURNING id, created_at",
        )
        .bind(to_db_id(post_id)?)
        .bind(user_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(Comment {
            id: from_db_id(id)?,
            post_id,
            user_id: user_id.to_string(),
            text: text.to_string(),
            created_at,
        })
    }

    async fn delete_comment(&self, user_id: &str, comment_id: CommentId) -> Result<PostId> {
        let comment_id = to_db_id(comment_id)?;
        let mut tx = self.pool.begin().await.map_err(Error::store)?;

        let (post_id, owner): (i64, String) =
            sqlx::query_as("SELECT post_id, user_id FROM comments WHERE id = $1 FOR UPDATE")
                .bind(comment_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?
                .ok_or(Error::NotFound)?;

        if owner != user_id {
            return Err(Error::Forbidden);
        }

        sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(Error::store)?;

        from_db_id(post_id)
    }

    async fn post_owner(&self, post_id: PostId) -> Result<PostOwner> {
        let user_id: String = sqlx::query_scalar("SELECT user_id FROM posts WHERE id = $1")
            .bind(to_db_id(post_id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(Error::NotFound)?;

        Ok(PostOwner { post_id, user_id })
    }

    async fn count_likes(&self, post_id: PostId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = $1")
            .bind(to_db_id(post_id)?)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(from_db_count(count))
    }

    async fn count_comments(&self, post_id: PostId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = $1")
            .bind(to_db_id(post_id)?)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(from_db_count(count))
    }
}

impl std::fmt::Debug for PostgresEngagementStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresEngagementStore")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            Error::NotFound
        ));
    }

    #[test]
    fn test_other_errors_map_to_store() {
        let err = map_sqlx_error(sqlx::Error::PoolTimedOut);
        assert_eq!(err.code(), "store_error");
    }

    #[test]
    fn test_id_conversion_bounds() {
        assert_eq!(to_db_id(42).unwrap(), 42);
        assert!(matches!(to_db_id(u64::MAX), Err(Error::InvalidInput(_))));
        assert!(from_db_id(-1).is_err());
        assert_eq!(from_db_count(-3), 0);
    }
}
