#![deny(clippy::all)]

use crate::domain::{Comment, CommentId, Like, Notification, PostId, PostOwner};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use shared::{Result, TtlMs};

// Ports are the pluggable extension points for the stores behind the core

/// Port for the fast key-value store holding denormalized counters (e.g. Moka, Redis)
#[async_trait]
pub trait CacheStore<K, V>: Send + Sync + 'static {
    async fn put(&self, key: K, val: V, ttl: Option<TtlMs>) -> Result<()>;
    /// `Ok(None)` is a miss; `Err` means the store itself could not answer.
    async fn get(&self, key: &K) -> Result<Option<V>>;
    /// Store `val` only if the key holds nothing. Returns whether it was written.
    async fn put_if_absent(&self, key: K, val: V, ttl: Option<TtlMs>) -> Result<bool>;
}

/// Authoritative source of a count, backed by the relational store.
#[async_trait]
pub trait CountStore: Send + Sync + 'static {
    async fn get_value(&self, entity_id: PostId) -> Result<u64>;
}

/// Relational write path for likes and comments.
#[async_trait]
pub trait EngagementStore: Send + Sync + 'static {
    /// Minimal post row so likes and comments have something to attach to.
    async fn create_post(&self, user_id: &str) -> Result<PostOwner>;

    /// Fails with `Conflict` if the user already liked the post.
    async fn create_like(&self, user_id: &str, post_id: PostId) -> Result<Like>;

    /// Fails with `NotFound` if there is no such like.
    async fn delete_like(&self, user_id: &str, post_id: PostId) -> Result<()>;

    async fn create_comment(&self, user_id: &str, post_id: PostId, text: &str) -> Result<Comment>;

    /// Deletes a comment owned by `user_id` and returns the post it belonged to.
    async fn delete_comment(&self, user_id: &str, comment_id: CommentId) -> Result<PostId>;

    async fn post_owner(&self, post_id: PostId) -> Result<PostOwner>;

    async fn count_likes(&self, post_id: PostId) -> Result<u64>;

    async fn count_comments(&self, post_id: PostId) -> Result<u64>;
}

/// Item yielded by a live subscription.
#[derive(Clone, Debug, PartialEq)]
pub enum LiveEvent {
    Notification(Notification),
    /// The subscriber fell behind and this many live items were skipped.
    Lagged(u64),
}

/// Live feed for one receiver. Dropping it unsubscribes.
pub struct Subscription {
    receiver_id: String,
    stream: BoxStream<'static, LiveEvent>,
    on_drop: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(receiver_id: impl Into<String>, stream: BoxStream<'static, LiveEvent>) -> Self {
        Self {
            receiver_id: receiver_id.into(),
            stream,
            on_drop: None,
        }
    }

    /// Register cleanup for bus-side subscriber state, run when the subscription is dropped.
    pub fn on_drop(mut self, cleanup: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.on_drop = Some(Box::new(cleanup));
        self
    }

    pub fn receiver_id(&self) -> &str {
        &self.receiver_id
    }

    /// Next live event; `None` once the bus closed the channel.
    pub async fn next(&mut self) -> Option<LiveEvent> {
        self.stream.next().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // the live receiver must be gone before bus-side cleanup inspects it
        drop(std::mem::replace(
            &mut self.stream,
            futures::stream::empty().boxed(),
        ));
        if let Some(cleanup) = self.on_drop.take() {
            cleanup();
        }
        tracing::debug!("Unsubscribed live channel for receiver '{}'", self.receiver_id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("receiver_id", &self.receiver_id)
            .finish()
    }
}

/// Durable per-receiver queue plus live pub/sub channel.
#[async_trait]
pub trait NotificationBus: Send + Sync + 'static {
    /// Queue the notification for its receiver and push it on the live channel.
    /// Only a queueing failure is an error; live delivery is best effort.
    async fn publish(&self, notification: &Notification) -> Result<()>;

    /// Atomically take every queued notification for `receiver_id`, oldest first.
    async fn drain(&self, receiver_id: &str) -> Result<Vec<Notification>>;

    /// Live notifications published from now on. No backfill.
    async fn subscribe(&self, receiver_id: &str) -> Result<Subscription>;
}

/// Orders drained notifications by creation time. The sort is stable, so ties
/// keep the order they were queued in.
pub fn order_for_delivery(mut notifications: Vec<Notification>) -> Vec<Notification> {
    notifications.sort_by_key(|n| n.created_at);
    notifications
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NotificationKind;
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_order_for_delivery_is_stable() {
        let now = Utc::now();
        let mut a = Notification::new(NotificationKind::Event, "s", "r", "a");
        let mut b = Notification::new(NotificationKind::Event, "s", "r", "b");
        let mut c = Notification::new(NotificationKind::Event, "s", "r", "c");
        a.created_at = now + Duration::seconds(5);
        b.created_at = now;
        c.created_at = now;

        let ordered = order_for_delivery(vec![a, b, c]);
        let contents: Vec<_> = ordered.iter().map(|n| n.content.as_str()).collect();
        assert_eq!(contents, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_subscription_runs_cleanup_on_drop() {
        let cleaned = Arc::new(AtomicBool::new(false));
        let flag = cleaned.clone();
        let mut sub = Subscription::new("bob", futures::stream::empty().boxed())
            .on_drop(move || flag.store(true, Ordering::SeqCst));

        assert_eq!(sub.receiver_id(), "bob");
        assert!(sub.next().await.is_none());
        drop(sub);
        assert!(cleaned.load(Ordering::SeqCst));
    }
}
