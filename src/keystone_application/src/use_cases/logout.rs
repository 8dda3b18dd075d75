use keystone_core::{RequestContext, UserStore, UserStoreError};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum LogoutError {
    #[error("User store error: {0}")]
    Store(#[from] UserStoreError),
}

/// Logout use case - marks a session as expired by its user
pub struct LogoutUseCase<'a, U>
where
    U: UserStore,
{
    user_store: &'a U,
}

impl<'a, U> LogoutUseCase<'a, U>
where
    U: UserStore,
{
    pub fn new(user_store: &'a U) -> Self {
        Self { user_store }
    }

    /// Logging out of an unknown or already closed session succeeds.
    #[tracing::instrument(name = "LogoutUseCase::execute", skip(self, ctx))]
    pub async fn execute(&self, ctx: &RequestContext, session_id: Uuid) -> Result<(), LogoutError> {
        self.user_store.expire_user_session(ctx, session_id).await?;
        Ok(())
    }
}
