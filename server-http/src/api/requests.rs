use serde::Deserialize;
use skillnet::domain::PostId;

/// `?post=<id>` on comment creation
#[derive(Debug, Deserialize)]
pub struct CommentQuery {
    pub post: PostId,
}

#[derive(Debug, Deserialize)]
pub struct NewComment {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct PublishNotificationRequest {
    pub receiver_id: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct IssueSessionRequest {
    pub user_id: String,
    pub username: String,
}
