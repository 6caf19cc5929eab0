use chrono::{DateTime, Utc};
use serde::Serialize;
use skillnet::domain::{Comment, CurrentUser, Like, PostId, PostOwner};

/// Success envelope: `{"data": ...}`
#[derive(Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}

impl<T> Data<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LikeCreated {
    pub like: Like,
    pub like_count: u64,
}

#[derive(Debug, Serialize)]
pub struct LikeDeleted {
    pub like_count: u64,
}

#[derive(Debug, Serialize)]
pub struct CommentCreated {
    pub comment: Comment,
    pub comment_count: u64,
}

#[derive(Debug, Serialize)]
pub struct CommentDeleted {
    pub comment_count: u64,
}

#[derive(Debug, Serialize)]
pub struct PostCounts {
    pub post_id: PostId,
    pub like_count: u64,
    pub comment_count: u64,
}

#[derive(Debug, Serialize)]
pub struct PostCreated {
    pub post: PostOwner,
}

#[derive(Debug, Serialize)]
pub struct SessionIssued {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: CurrentUser,
}

#[derive(Debug, Serialize)]
pub struct SessionsRevoked {
    pub revoked: usize,
}
