use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::domain::{
    email::Email, password::Password, session::UserSession, session_token::SessionToken,
    user::User,
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// UserStore port trait and errors
#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("User not found")]
    UserNotFound,
    #[error("Email address is already registered")]
    DuplicateEmail,
    #[error("Incorrect password")]
    IncorrectPassword,
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },
    #[error("Unexpected error during {operation}: {source}")]
    Unexpected {
        operation: &'static str,
        #[source]
        source: BoxError,
    },
}

impl UserStoreError {
    pub fn unexpected(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Unexpected {
            operation,
            source: source.into(),
        }
    }

    /// Failures of the store itself rather than outcomes a caller can act on.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Unexpected { .. })
    }
}

impl PartialEq for UserStoreError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::UserNotFound, Self::UserNotFound) => true,
            (Self::DuplicateEmail, Self::DuplicateEmail) => true,
            (Self::IncorrectPassword, Self::IncorrectPassword) => true,
            (Self::Timeout { operation: a }, Self::Timeout { operation: b }) => a == b,
            (Self::Unexpected { operation: a, .. }, Self::Unexpected { operation: b, .. }) => {
                a == b
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateUserArgs {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub email: Email,
    pub password: Password,
}

#[derive(Debug, Clone)]
pub struct CreateUserSessionArgs {
    pub user_id: Uuid,
    pub token: SessionToken,
    pub expires_at: DateTime<Utc>,
}

/// The only way user and session state is read or written.
///
/// Every call is bounded by the implementation's timeout, shortened further
/// when `ctx` carries an earlier deadline.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user_by_id(&self, ctx: &RequestContext, id: Uuid)
    -> Result<User, UserStoreError>;

    async fn get_user_by_email(
        &self,
        ctx: &RequestContext,
        email: &Email,
    ) -> Result<User, UserStoreError>;

    /// Returns the session as stored, whatever its expiry. Enforcing
    /// `expires_at` is up to the caller.
    async fn get_user_by_session_token(
        &self,
        ctx: &RequestContext,
        token: &SessionToken,
    ) -> Result<(User, UserSession), UserStoreError>;

    async fn authenticate_user(
        &self,
        ctx: &RequestContext,
        email: &Email,
        password: &Password,
    ) -> Result<User, UserStoreError>;

    /// Hashes the password and creates the user together with its password
    /// credential. Either both rows are persisted or neither is.
    async fn create_user_password(
        &self,
        ctx: &RequestContext,
        args: CreateUserArgs,
    ) -> Result<User, UserStoreError>;

    async fn create_user_session(
        &self,
        ctx: &RequestContext,
        args: CreateUserSessionArgs,
    ) -> Result<UserSession, UserStoreError>;

    /// Flags the session as expired by its user. Expiring an already expired
    /// or unknown session succeeds without changing anything.
    async fn expire_user_session(
        &self,
        ctx: &RequestContext,
        session_id: Uuid,
    ) -> Result<(), UserStoreError>;
}
