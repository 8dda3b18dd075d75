use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::session_token::SessionToken;

/// Where a session stands at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    /// The owner logged out. Terminal.
    ExpiredByUser,
    /// `expires_at` has passed.
    Expired,
}

#[derive(Debug, Clone)]
pub struct UserSession {
    id: Uuid,
    user_id: Uuid,
    token: SessionToken,
    expires_at: DateTime<Utc>,
    expired_by_user: bool,
}

impl UserSession {
    pub fn new(
        id: Uuid,
        user_id: Uuid,
        token: SessionToken,
        expires_at: DateTime<Utc>,
        expired_by_user: bool,
    ) -> Self {
        Self {
            id,
            user_id,
            token,
            expires_at,
            expired_by_user,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn expired_by_user(&self) -> bool {
        self.expired_by_user
    }

    /// Flags the session as logged out. There is no way back.
    pub fn expire_by_user(&mut self) {
        self.expired_by_user = true;
    }

    /// User-initiated expiry takes precedence over time-based expiry.
    pub fn state_at(&self, now: DateTime<Utc>) -> SessionState {
        if self.expired_by_user {
            SessionState::ExpiredByUser
        } else if now >= self.expires_at {
            SessionState::Expired
        } else {
            SessionState::Active
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == SessionState::Active
    }
}
