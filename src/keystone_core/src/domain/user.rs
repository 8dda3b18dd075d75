use std::fmt;
use std::str::FromStr;

use secrecy::Secret;
use thiserror::Error;
use uuid::Uuid;

use super::email::Email;
use super::password::MIN_PASSWORD_LENGTH;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UserError {
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Password must be at least {} characters long", MIN_PASSWORD_LENGTH)]
    PasswordTooShort,
    #[error("Unknown authentication provider: {0}")]
    UnknownProvider(String),
}

/// Which mechanism a [`UserAuth`] credential belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthProvider {
    Password,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Password => "password",
        }
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthProvider {
    type Err = UserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password" => Ok(AuthProvider::Password),
            other => Err(UserError::UnknownProvider(other.to_owned())),
        }
    }
}

/// A provider-tagged credential. For [`AuthProvider::Password`] the value is
/// a PHC-formatted hash string.
#[derive(Debug, Clone)]
pub struct UserAuth {
    value: Secret<String>,
    provider: AuthProvider,
}

impl UserAuth {
    pub fn new(value: Secret<String>, provider: AuthProvider) -> Self {
        Self { value, provider }
    }

    pub fn value(&self) -> &Secret<String> {
        &self.value
    }

    pub fn provider(&self) -> AuthProvider {
        self.provider
    }
}

#[derive(Debug, Clone)]
pub struct User {
    id: Uuid,
    given_name: Option<String>,
    family_name: Option<String>,
    email: Email,
    auth: UserAuth,
}

impl User {
    pub fn new(
        id: Uuid,
        given_name: Option<String>,
        family_name: Option<String>,
        email: Email,
        auth: UserAuth,
    ) -> Self {
        Self {
            id,
            given_name,
            family_name,
            email,
            auth,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn given_name(&self) -> Option<&str> {
        self.given_name.as_deref()
    }

    pub fn family_name(&self) -> Option<&str> {
        self.family_name.as_deref()
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn auth(&self) -> &UserAuth {
        &self.auth
    }
}
