use secrecy::{ExposeSecret, Secret};

use super::user::UserError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// A plaintext password candidate. Only ever hashed or verified, never stored.
#[derive(Debug, Clone)]
pub struct Password(Secret<String>);

impl Password {
    pub fn parse(raw: impl Into<String>) -> Result<Self, UserError> {
        Self::try_from(Secret::new(raw.into()))
    }
}

impl TryFrom<Secret<String>> for Password {
    type Error = UserError;

    fn try_from(value: Secret<String>) -> Result<Self, Self::Error> {
        if value.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
            return Err(UserError::PasswordTooShort);
        }
        Ok(Self(value))
    }
}

impl AsRef<Secret<String>> for Password {
    fn as_ref(&self) -> &Secret<String> {
        &self.0
    }
}
