// Public API
pub mod moka_session_repository;
pub mod session;
pub mod session_store;

// Re-export commonly used types
pub use moka_session_repository::MokaSessionRepository;
pub use session::{Session, SessionToken, generate_session_token};
pub use session_store::{SessionRepository, SessionStore};
