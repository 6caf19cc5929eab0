use crate::domain::{CommentId, CurrentUser, Notification, NotificationKind, PostOwner};
use crate::ports::NotificationBus;
use shared::{Error, Result};
use std::sync::Arc;
use tracing::{debug, warn};

pub fn like_notification(liker: &CurrentUser, post: &PostOwner) -> Notification {
    Notification::new(
        NotificationKind::Like,
        liker.user_id.clone(),
        post.user_id.clone(),
        format!("{} liked your post", liker.username),
    )
    .with_post(post.post_id)
}

pub fn comment_notification(
    commenter: &CurrentUser,
    post: &PostOwner,
    comment_id: CommentId,
) -> Notification {
    Notification::new(
        NotificationKind::Comment,
        commenter.user_id.clone(),
        post.user_id.clone(),
        format!("{} commented on your post", commenter.username),
    )
    .with_post(post.post_id)
    .with_comment(comment_id)
}

/// Produces notifications for write-side actions and hands them to the bus.
#[derive(Clone)]
pub struct Notifier {
    bus: Arc<dyn NotificationBus>,
}

impl Notifier {
    pub fn new(bus: Arc<dyn NotificationBus>) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &Arc<dyn NotificationBus> {
        &self.bus
    }

    /// Explicit publish; queueing failures are returned to the caller.
    pub async fn publish(&self, notification: &Notification) -> Result<()> {
        self.bus
            .publish(notification)
            .await
            .map_err(|e| match e {
                Error::BusPublish(_) => e,
                other => Error::BusPublish(other.to_string()),
            })
    }

    /// Publish an ad-hoc event from the caller to another user.
    pub async fn publish_event(
        &self,
        sender: &CurrentUser,
        receiver_id: &str,
        content: &str,
    ) -> Result<Notification> {
        if receiver_id.trim().is_empty() {
            return Err(Error::InvalidInput("receiver_id must not be empty".into()));
        }
        let notification = Notification::new(
            NotificationKind::Event,
            sender.user_id.clone(),
            receiver_id,
            content,
        );
        self.publish(&notification).await?;
        Ok(notification)
    }

    pub async fn notify_like(&self, liker: &CurrentUser, post: &PostOwner) {
        self.fire_and_forget(liker, post, like_notification(liker, post))
            .await;
    }

    pub async fn notify_comment(&self, commenter: &CurrentUser, post: &PostOwner, comment_id: CommentId) {
        self.fire_and_forget(
            commenter,
            post,
            comment_notification(commenter, post, comment_id),
        )
        .await;
    }

    // The write that triggered the notification already succeeded, so a bus
    // failure must not fail the request.
    async fn fire_and_forget(&self, actor: &CurrentUser, post: &PostOwner, notification: Notification) {
        if actor.user_id == post.user_id {
            debug!("Skipping self-notification on post {}", post.post_id);
            return;
        }
        if let Err(e) = self.publish(&notification).await {
            warn!(
                "Dropped {:?} notification for '{}' on post {}: {}",
                notification.kind, notification.receiver_id, post.post_id, e
            );
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}
