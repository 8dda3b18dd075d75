use std::time::Duration;

use keystone_core::{
    AuthProvider, CreateUserArgs, CreateUserSessionArgs, Email, Password, RequestContext,
    SessionToken, User, UserSession, UserStore, UserStoreError,
};
use secrecy::{ExposeSecret, Secret};
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use super::models::{UserAuthRow, UserRow, UserSessionJoinRow, UserSessionRow, UserWithAuthRow};
use super::{DEFAULT_STORE_TIMEOUT, run_bounded};
use crate::password_hashing::{Argon2PasswordHasher, PasswordHashingError};

pub const USERS_EMAIL_CONSTRAINT: &str = "users_email_key";
pub const USER_SESSIONS_TOKEN_CONSTRAINT: &str = "user_sessions_token_key";

const SELECT_USER_BY_ID: &str = r#"
    SELECT u.id, u.given_name, u.family_name, u.email, a.value, a.provider
    FROM users u
    JOIN user_auths a ON a.user_id = u.id AND a.provider = $2
    WHERE u.id = $1
"#;

const SELECT_USER_BY_EMAIL: &str = r#"
    SELECT u.id, u.given_name, u.family_name, u.email, a.value, a.provider
    FROM users u
    JOIN user_auths a ON a.user_id = u.id AND a.provider = $2
    WHERE u.email = $1
"#;

const SELECT_USER_BY_SESSION_TOKEN: &str = r#"
    SELECT u.id, u.given_name, u.family_name, u.email, a.value, a.provider,
           s.id AS session_id,
           s.token AS session_token,
           s.expires_at AS session_expires_at,
           s.user_expired AS session_user_expired
    FROM user_sessions s
    JOIN users u ON u.id = s.user_id
    JOIN user_auths a ON a.user_id = u.id AND a.provider = $2
    WHERE s.token = $1
"#;

const INSERT_USER: &str = r#"
    INSERT INTO users (id, given_name, family_name, email)
    VALUES ($1, $2, $3, $4)
    RETURNING id, given_name, family_name, email
"#;

const INSERT_USER_AUTH: &str = r#"
    INSERT INTO user_auths (id, user_id, value, provider)
    VALUES ($1, $2, $3, $4)
    RETURNING value, provider
"#;

const INSERT_USER_SESSION: &str = r#"
    INSERT INTO user_sessions (id, user_id, token, expires_at)
    VALUES ($1, $2, $3, $4)
    RETURNING id, user_id, token, expires_at, user_expired
"#;

const EXPIRE_USER_SESSION: &str = r#"
    UPDATE user_sessions
    SET user_expired = TRUE
    WHERE id = $1
"#;

/// Maps a raw `sqlx` error onto the store's closed set of error kinds.
///
/// This is the only place that looks at driver-level error shapes.
pub fn classify_sqlx_error(operation: &'static str, error: sqlx::Error) -> UserStoreError {
    if matches!(error, sqlx::Error::RowNotFound) {
        return UserStoreError::UserNotFound;
    }
    if let sqlx::Error::Database(db_err) = &error {
        if db_err.is_unique_violation() && db_err.constraint() == Some(USERS_EMAIL_CONSTRAINT) {
            return UserStoreError::DuplicateEmail;
        }
    }
    UserStoreError::unexpected(operation, error)
}

#[derive(Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
    hasher: Argon2PasswordHasher,
    timeout: Duration,
}

impl PostgresUserStore {
    pub fn new(pool: Pool<Postgres>, hasher: Argon2PasswordHasher) -> Self {
        PostgresUserStore {
            pool,
            hasher,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn fetch_user_by_email(
        &self,
        operation: &'static str,
        email: &Email,
    ) -> Result<User, UserStoreError> {
        sqlx::query_as::<_, UserWithAuthRow>(SELECT_USER_BY_EMAIL)
            .bind(email.as_ref().expose_secret().as_str())
            .bind(AuthProvider::Password.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify_sqlx_error(operation, e))?
            .into_user()
            .map_err(|e| UserStoreError::unexpected(operation, e))
    }
}

#[async_trait::async_trait]
impl UserStore for PostgresUserStore {
    async fn get_user_by_id(
        &self,
        ctx: &RequestContext,
        id: Uuid,
    ) -> Result<User, UserStoreError> {
        const OPERATION: &str = "get user by id";
        run_bounded(ctx, OPERATION, self.timeout, async move {
            sqlx::query_as::<_, UserWithAuthRow>(SELECT_USER_BY_ID)
                .bind(id)
                .bind(AuthProvider::Password.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| classify_sqlx_error(OPERATION, e))?
                .into_user()
                .map_err(|e| UserStoreError::unexpected(OPERATION, e))
        })
        .await
    }

    async fn get_user_by_email(
        &self,
        ctx: &RequestContext,
        email: &Email,
    ) -> Result<User, UserStoreError> {
        const OPERATION: &str = "get user by email";
        run_bounded(ctx, OPERATION, self.timeout, async move {
            self.fetch_user_by_email(OPERATION, email).await
        })
        .await
    }

    async fn get_user_by_session_token(
        &self,
        ctx: &RequestContext,
        token: &SessionToken,
    ) -> Result<(User, UserSession), UserStoreError> {
        const OPERATION: &str = "get user by session token";
        run_bounded(ctx, OPERATION, self.timeout, async move {
            sqlx::query_as::<_, UserSessionJoinRow>(SELECT_USER_BY_SESSION_TOKEN)
                .bind(token.as_str())
                .bind(AuthProvider::Password.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| classify_sqlx_error(OPERATION, e))?
                .into_entities()
                .map_err(|e| UserStoreError::unexpected(OPERATION, e))
        })
        .await
    }

    async fn authenticate_user(
        &self,
        ctx: &RequestContext,
        email: &Email,
        password: &Password,
    ) -> Result<User, UserStoreError> {
        const OPERATION: &str = "authenticate user";
        run_bounded(ctx, OPERATION, self.timeout, async move {
            let user = self.fetch_user_by_email(OPERATION, email).await?;

            self.hasher
                .verify_password_hash(user.auth().value().clone(), password.clone())
                .await
                .map_err(|e| match e {
                    PasswordHashingError::Mismatch => UserStoreError::IncorrectPassword,
                    other => UserStoreError::unexpected(OPERATION, other),
                })?;

            Ok(user)
        })
        .await
    }

    async fn create_user_password(
        &self,
        ctx: &RequestContext,
        args: CreateUserArgs,
    ) -> Result<User, UserStoreError> {
        const OPERATION: &str = "create user password";
        run_bounded(ctx, OPERATION, self.timeout, async move {
            tracing::info!(
                given_name = ?args.given_name,
                family_name = ?args.family_name,
                "Creating user"
            );

            // No pooled connection is held while hashing.
            let password_hash: Secret<String> = self
                .hasher
                .compute_password_hash(args.password)
                .await
                .map_err(|e| UserStoreError::unexpected(OPERATION, e))?;

            // Rolled back on drop unless committed below.
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| classify_sqlx_error(OPERATION, e))?;

            let user_row = sqlx::query_as::<_, UserRow>(INSERT_USER)
                .bind(Uuid::new_v4())
                .bind(args.given_name.as_deref())
                .bind(args.family_name.as_deref())
                .bind(args.email.as_ref().expose_secret().as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| classify_sqlx_error(OPERATION, e))?;

            let auth_row = sqlx::query_as::<_, UserAuthRow>(INSERT_USER_AUTH)
                .bind(Uuid::new_v4())
                .bind(user_row.id)
                .bind(password_hash.expose_secret().as_str())
                .bind(AuthProvider::Password.as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| classify_sqlx_error(OPERATION, e))?;

            tx.commit()
                .await
                .map_err(|e| classify_sqlx_error(OPERATION, e))?;

            UserWithAuthRow {
                user: user_row,
                auth: auth_row,
            }
            .into_user()
            .map_err(|e| UserStoreError::unexpected(OPERATION, e))
        })
        .await
    }

    async fn create_user_session(
        &self,
        ctx: &RequestContext,
        args: CreateUserSessionArgs,
    ) -> Result<UserSession, UserStoreError> {
        const OPERATION: &str = "create user session";
        run_bounded(ctx, OPERATION, self.timeout, async move {
            sqlx::query_as::<_, UserSessionRow>(INSERT_USER_SESSION)
                .bind(Uuid::new_v4())
                .bind(args.user_id)
                .bind(args.token.as_str())
                .bind(args.expires_at)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| classify_sqlx_error(OPERATION, e))?
                .into_session()
                .map_err(|e| UserStoreError::unexpected(OPERATION, e))
        })
        .await
    }

    async fn expire_user_session(
        &self,
        ctx: &RequestContext,
        session_id: Uuid,
    ) -> Result<(), UserStoreError> {
        const OPERATION: &str = "expire user session";
        run_bounded(ctx, OPERATION, self.timeout, async move {
            let result = sqlx::query(EXPIRE_USER_SESSION)
                .bind(session_id)
                .execute(&self.pool)
                .await
                .map_err(|e| classify_sqlx_error(OPERATION, e))?;

            if result.rows_affected() == 0 {
                tracing::debug!(%session_id, "No session to expire");
            }
            Ok(())
        })
        .await
    }
}
