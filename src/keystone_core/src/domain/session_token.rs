use std::fmt;

use rand::{Rng, distr::Alphanumeric};
use thiserror::Error;

/// 43 alphanumeric characters carry a little over 256 bits of entropy.
pub const SESSION_TOKEN_LENGTH: usize = 43;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionTokenError {
    #[error("Session token must not be empty")]
    Empty,
}

/// Opaque bearer token identifying a [`UserSession`](super::session::UserSession).
///
/// Uniqueness is enforced by the store, so tokens handed to the repository
/// must come from a collision-resistant source. [`SessionToken::generate`] is
/// that source.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn generate() -> Self {
        let token = rand::rng()
            .sample_iter(Alphanumeric)
            .take(SESSION_TOKEN_LENGTH)
            .map(char::from)
            .collect();
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SessionToken {
    type Error = SessionTokenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Err(SessionTokenError::Empty);
        }
        Ok(Self(value))
    }
}

impl AsRef<str> for SessionToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken([REDACTED])")
    }
}
