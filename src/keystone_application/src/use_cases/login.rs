use chrono::Utc;
use keystone_core::{
    CreateUserSessionArgs, Email, Password, RequestContext, SessionToken, User, UserSession,
    UserStore, UserStoreError,
};

/// Error types specific to login use case
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    /// Unknown email and wrong password are indistinguishable to the caller.
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("User store error: {0}")]
    Store(#[source] UserStoreError),
}

impl From<UserStoreError> for LoginError {
    fn from(error: UserStoreError) -> Self {
        match error {
            UserStoreError::UserNotFound | UserStoreError::IncorrectPassword => {
                LoginError::InvalidCredentials
            }
            other => LoginError::Store(other),
        }
    }
}

/// Login use case - verifies credentials and opens a session
pub struct LoginUseCase<'a, U>
where
    U: UserStore,
{
    user_store: &'a U,
    session_ttl: chrono::Duration,
}

impl<'a, U> LoginUseCase<'a, U>
where
    U: UserStore,
{
    pub fn new(user_store: &'a U, session_ttl: chrono::Duration) -> Self {
        Self {
            user_store,
            session_ttl,
        }
    }

    #[tracing::instrument(name = "LoginUseCase::execute", skip_all)]
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        email: &Email,
        password: &Password,
    ) -> Result<(User, UserSession), LoginError> {
        let user = self.user_store.authenticate_user(ctx, email, password).await?;

        let session = self
            .user_store
            .create_user_session(
                ctx,
                CreateUserSessionArgs {
                    user_id: user.id(),
                    token: SessionToken::generate(),
                    expires_at: Utc::now() + self.session_ttl,
                },
            )
            .await?;

        tracing::info!(user_id = %user.id(), session_id = %session.id(), "Session opened");
        Ok((user, session))
    }
}
