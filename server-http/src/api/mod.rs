pub mod requests;
pub mod responses;

pub use requests::{CommentQuery, IssueSessionRequest, NewComment, PublishNotificationRequest};
pub use responses::{
    CommentCreated, CommentDeleted, Data, HealthResponse, LikeCreated, LikeDeleted,
    PostCounts, PostCreated, SessionIssued, SessionsRevoked, StatusResponse,
};
