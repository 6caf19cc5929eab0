pub mod comments;
pub mod health;
pub mod likes;
pub mod notifications;
pub mod posts;
pub mod sessions;

pub use comments::{create_comment, delete_comment};
pub use health::health_check;
pub use likes::{like_post, unlike_post};
pub use notifications::{publish_notification, stream_notifications};
pub use posts::{create_post, post_counts};
pub use sessions::{issue_session, revoke_all_sessions, revoke_session};
