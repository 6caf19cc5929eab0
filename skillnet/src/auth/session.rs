use crate::domain::CurrentUser;
use chrono::{DateTime, Duration, Utc};

/// Session token type - a secure random string
pub type SessionToken = String;

/// Identity attached to a bearer token, with expiry tracking.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub user: CurrentUser,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl Session {
    pub fn new(token: SessionToken, user: CurrentUser, ttl: std::time::Duration) -> Self {
        let now = Utc::now();
        let ttl = Duration::from_std(ttl).unwrap_or(Duration::MAX);

        Self {
            token,
            user,
            created_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            last_accessed: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    pub fn touch(&mut self) {
        self.last_accessed = Utc::now();
    }

    /// Remaining lifetime, zero once expired.
    pub fn remaining_ttl(&self) -> std::time::Duration {
        (self.expires_at - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO)
    }
}

/// Generate a cryptographically secure random session token
pub fn generate_session_token() -> SessionToken {
    use rand::Rng;

    // 32 random bytes, hex encoded (64 characters)
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..32).map(|_| rng.random()).collect();

    bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>()
}
