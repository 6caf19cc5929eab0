pub mod authentication;

pub use authentication::{BearerToken, require_session};
