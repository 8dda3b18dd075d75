//! Row shapes returned by the Postgres queries and their mapping onto domain
//! entities. A row that does not map is a store fault, never a domain error.

use chrono::{DateTime, Utc};
use keystone_core::{
    AuthProvider, BoxError, Email, SessionToken, User, UserAuth, UserSession,
};
use secrecy::Secret;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub(super) struct UserRow {
    pub id: Uuid,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub email: String,
}

#[derive(sqlx::FromRow)]
pub(super) struct UserAuthRow {
    pub value: String,
    pub provider: String,
}

#[derive(sqlx::FromRow)]
pub(super) struct UserWithAuthRow {
    #[sqlx(flatten)]
    pub user: UserRow,
    #[sqlx(flatten)]
    pub auth: UserAuthRow,
}

#[derive(sqlx::FromRow)]
pub(super) struct UserSessionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user_expired: bool,
}

/// User, credential and session joined by token. Session columns are aliased
/// with a `session_` prefix to keep them apart from the user's.
#[derive(sqlx::FromRow)]
pub(super) struct UserSessionJoinRow {
    #[sqlx(flatten)]
    pub user: UserWithAuthRow,
    pub session_id: Uuid,
    pub session_token: String,
    pub session_expires_at: DateTime<Utc>,
    pub session_user_expired: bool,
}

impl UserWithAuthRow {
    pub fn into_user(self) -> Result<User, BoxError> {
        let email = Email::parse(self.user.email)?;
        let provider: AuthProvider = self.auth.provider.parse()?;

        Ok(User::new(
            self.user.id,
            self.user.given_name,
            self.user.family_name,
            email,
            UserAuth::new(Secret::new(self.auth.value), provider),
        ))
    }
}

impl UserSessionRow {
    pub fn into_session(self) -> Result<UserSession, BoxError> {
        Ok(UserSession::new(
            self.id,
            self.user_id,
            SessionToken::try_from(self.token)?,
            self.expires_at,
            self.user_expired,
        ))
    }
}

impl UserSessionJoinRow {
    pub fn into_entities(self) -> Result<(User, UserSession), BoxError> {
        let session = UserSessionRow {
            id: self.session_id,
            user_id: self.user.user.id,
            token: self.session_token,
            expires_at: self.session_expires_at,
            user_expired: self.session_user_expired,
        }
        .into_session()?;

        Ok((self.user.into_user()?, session))
    }
}
