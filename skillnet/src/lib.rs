pub mod auth;
pub mod counters;
pub mod domain;
pub mod notifications;
pub mod ports;

pub use counters::{CounterCache, EngagementCount};
pub use domain::{
    Comment, CommentId, CountKey, CountScope, CurrentUser, Like, Notification, NotificationKind,
    PostId, PostOwner, UserId,
};
pub use ports::{
    CacheStore, CountStore, EngagementStore, LiveEvent, NotificationBus, Subscription,
    order_for_delivery,
};
