use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use shared::{Error, Result};
use skillnet::domain::{Comment, CommentId, Like, PostId, PostOwner, UserId};
use skillnet::ports::EngagementStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Relational write path kept in memory. Used when no database is configured
/// and in tests.
#[derive(Default)]
pub struct InMemoryEngagementStore {
    posts: DashMap<PostId, UserId>,
    likes: DashMap<PostId, HashMap<UserId, Like>>,
    comments: DashMap<CommentId, Comment>,
    next_post_id: AtomicU64,
    next_comment_id: AtomicU64,
}

impl InMemoryEngagementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Posts live outside this subsystem; register the ones that may be liked
    /// or commented on.
    pub fn register_post(&self, post_id: PostId, owner: impl Into<UserId>) {
        self.posts.insert(post_id, owner.into());
    }

    fn ensure_post(&self, post_id: PostId) -> Result<()> {
        if self.posts.contains_key(&post_id) {
            Ok(())
        } else {
            Err(Error::NotFound)
        }
    }
}

#[async_trait]
impl EngagementStore for InMemoryEngagementStore {
    async fn create_post(&self, user_id: &str) -> Result<PostOwner> {
        // skip ids taken by registered posts
        let post_id = loop {
            let candidate = self.next_post_id.fetch_add(1, Ordering::SeqCst) + 1;
            if let Entry::Vacant(slot) = self.posts.entry(candidate) {
                slot.insert(user_id.to_string());
                break candidate;
            }
        };
        Ok(PostOwner {
            post_id,
            user_id: user_id.to_string(),
        })
    }

    async fn create_like(&self, user_id: &str, post_id: PostId) -> Result<Like> {
        self.ensure_post(post_id)?;

        let mut likes = self.likes.entry(post_id).or_default();
        if likes.contains_key(user_id) {
            return Err(Error::Conflict("post already liked".into()));
        }
        let like = Like {
            user_id: user_id.to_string(),
            post_id,
            created_at: Utc::now(),
        };
        likes.insert(user_id.to_string(), like.clone());
        Ok(like)
    }

    async fn delete_like(&self, user_id: &str, post_id: PostId) -> Result<()> {
        let removed = self
            .likes
            .get_mut(&post_id)
            .and_then(|mut likes| likes.remove(user_id));
        match removed {
            Some(_) => Ok(()),
            None => Err(Error::NotFound),
        }
    }

    async fn create_comment(&self, user_id: &str, post_id: PostId, text: &str) -> Result<Comment> {
        self.ensure_post(post_id)?;
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("comment text must not be empty".into()));
        }

        let comment = Comment {
            id: self.next_comment_id.fetch_add(1, Ordering::SeqCst) + 1,
            post_id,
            user_id: user_id.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        self.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn delete_comment(&self, user_id: &str, comment_id: CommentId) -> Result<PostId> {
        match self.comments.entry(comment_id) {
            Entry::Vacant(_) => Err(Error::NotFound),
            Entry::Occupied(entry) if entry.get().user_id != user_id => Err(Error::Forbidden),
            Entry::Occupied(entry) => Ok(entry.remove().post_id),
        }
    }

    async fn post_owner(&self, post_id: PostId) -> Result<PostOwner> {
        self.posts
            .get(&post_id)
            .map(|owner| PostOwner {
                post_id,
                user_id: owner.clone(),
            })
            .ok_or(Error::NotFound)
    }

    async fn count_likes(&self, post_id: PostId) -> Result<u64> {
        Ok(self.likes.get(&post_id).map(|l| l.len() as u64).unwrap_or(0))
    }

    async fn count_comments(&self, post_id: PostId) -> Result<u64> {
        Ok(self
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .count() as u64)
    }
}
