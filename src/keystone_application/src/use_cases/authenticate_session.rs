use chrono::Utc;
use keystone_core::{RequestContext, SessionState, SessionToken, User, UserSession, UserStore, UserStoreError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid session token")]
    InvalidToken,
    #[error("Session was closed by its user")]
    Revoked,
    #[error("Session has expired")]
    Expired,
    #[error("User store error: {0}")]
    Store(#[source] UserStoreError),
}

/// Resolves a bearer token to its user, accepting only active sessions
pub struct AuthenticateSessionUseCase<'a, U>
where
    U: UserStore,
{
    user_store: &'a U,
}

impl<'a, U> AuthenticateSessionUseCase<'a, U>
where
    U: UserStore,
{
    pub fn new(user_store: &'a U) -> Self {
        Self { user_store }
    }

    #[tracing::instrument(name = "AuthenticateSessionUseCase::execute", skip_all)]
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        token: &SessionToken,
    ) -> Result<(User, UserSession), SessionError> {
        let (user, session) = self
            .user_store
            .get_user_by_session_token(ctx, token)
            .await
            .map_err(|e| match e {
                UserStoreError::UserNotFound => SessionError::InvalidToken,
                other => SessionError::Store(other),
            })?;

        match session.state_at(Utc::now()) {
            SessionState::Active => Ok((user, session)),
            SessionState::ExpiredByUser => Err(SessionError::Revoked),
            SessionState::Expired => Err(SessionError::Expired),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use keystone_core::CreateUserArgs;
    use uuid::Uuid;

    use super::*;
    use crate::test_support::{MockUserStore, email, password};

    async fn store_with_session(expires_in: Duration) -> (MockUserStore, UserSession) {
        let user_store = MockUserStore::default();
        let ctx = RequestContext::new();
        let user = user_store
            .create_user_password(
                &ctx,
                CreateUserArgs {
                    given_name: None,
                    family_name: None,
                    email: email("test@example.com"),
                    password: password("password123"),
                },
            )
            .await
            .unwrap();
        let session = UserSession::new(
            Uuid::new_v4(),
            user.id(),
            SessionToken::generate(),
            Utc::now() + expires_in,
            false,
        );
        user_store.insert_session(session.clone()).await;
        (user_store, session)
    }

    #[tokio::test]
    async fn test_active_session_resolves_to_user() {
        let (user_store, session) = store_with_session(Duration::hours(1)).await;
        let use_case = AuthenticateSessionUseCase::new(&user_store);

        let (user, found) = use_case
            .execute(&RequestContext::new(), session.token())
            .await
            .unwrap();

        assert_eq!(user.id(), session.user_id());
        assert_eq!(found.id(), session.id());
    }

    #[tokio::test]
    async fn test_logged_out_session_is_revoked() {
        let (user_store, session) = store_with_session(Duration::hours(1)).await;
        let ctx = RequestContext::new();
        user_store
            .expire_user_session(&ctx, session.id())
            .await
            .unwrap();
        let use_case = AuthenticateSessionUseCase::new(&user_store);

        let result = use_case.execute(&ctx, session.token()).await;
        assert!(matches!(result, Err(SessionError::Revoked)));
    }

    #[tokio::test]
    async fn test_time_expired_session_is_rejected() {
        let (user_store, session) = store_with_session(-Duration::minutes(1)).await;
        let use_case = AuthenticateSessionUseCase::new(&user_store);

        let result = use_case
            .execute(&RequestContext::new(), session.token())
            .await;
        assert!(matches!(result, Err(SessionError::Expired)));
    }

    #[tokio::test]
    async fn test_unknown_token_is_invalid() {
        let user_store = MockUserStore::default();
        let use_case = AuthenticateSessionUseCase::new(&user_store);

        let result = use_case
            .execute(&RequestContext::new(), &SessionToken::generate())
            .await;
        assert!(matches!(result, Err(SessionError::InvalidToken)));
    }
}
