use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type UserId = String;
pub type PostId = u64;
pub type CommentId = u64;

/// Category of countable association scoped to a post.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountScope {
    Likes,
    Comments,
}

impl CountScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountScope::Likes => "likes",
            CountScope::Comments => "comments",
        }
    }
}

impl fmt::Display for CountScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of one counter in the fast store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CountKey {
    pub scope: CountScope,
    pub entity_id: PostId,
}

impl CountKey {
    pub fn new(scope: CountScope, entity_id: PostId) -> Self {
        Self { scope, entity_id }
    }

    /// String form used as the fast-store key, e.g. `likes:42`.
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.entity_id)
    }
}

/// Authenticated caller, as resolved by the session layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub user_id: UserId,
    pub username: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Like,
    Comment,
    Event,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<PostId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<CommentId>,
    pub created_at: DateTime<Utc>,
    pub content: String,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        sender_id: impl Into<UserId>,
        receiver_id: impl Into<UserId>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            kind,
            post_id: None,
            comment_id: None,
            created_at: Utc::now(),
            content: content.into(),
        }
    }

    pub fn with_post(mut self, post_id: PostId) -> Self {
        self.post_id = Some(post_id);
        self
    }

    pub fn with_comment(mut self, comment_id: CommentId) -> Self {
        self.comment_id = Some(comment_id);
        self
    }

    pub fn to_json(&self) -> shared::Result<String> {
        serde_json::to_string(self).map_err(|e| shared::Error::Internal(e.to_string()))
    }

    pub fn from_json(raw: &str) -> shared::Result<Self> {
        serde_json::from_str(raw).map_err(|e| shared::Error::Store(e.to_string()))
    }
}

/// A post as far as notifications are concerned: who gets told about it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PostOwner {
    pub post_id: PostId,
    pub user_id: UserId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    pub user_id: UserId,
    pub post_id: PostId,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_key_format() {
        assert_eq!(CountKey::new(CountScope::Likes, 42).cache_key(), "likes:42");
        assert_eq!(
            CountKey::new(CountScope::Comments, 7).cache_key(),
            "comments:7"
        );
    }

    #[test]
    fn test_notification_json_shape() {
        let notif = Notification::new(NotificationKind::Like, "alice", "bob", "alice liked your post")
            .with_post(3);
        let json: serde_json::Value = serde_json::from_str(&notif.to_json().unwrap()).unwrap();

        assert_eq!(json["type"], "like");
        assert_eq!(json["sender_id"], "alice");
        assert_eq!(json["receiver_id"], "bob");
        assert_eq!(json["post_id"], 3);
        assert!(json.get("comment_id").is_none());

        let back = Notification::from_json(&notif.to_json().unwrap()).unwrap();
        assert_eq!(back, notif);
    }
}
