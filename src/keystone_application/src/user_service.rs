use std::sync::Arc;

use keystone_core::{
    CreateUserArgs, Email, EmailClient, Password, RequestContext, SessionToken, User,
    UserSession, UserStore, UserStoreError,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::background::BackgroundTasks;
use crate::use_cases::{
    authenticate_session::{AuthenticateSessionUseCase, SessionError},
    login::{LoginError, LoginUseCase},
    logout::{LogoutError, LogoutUseCase},
    signup::{SignupError, SignupUseCase},
};

/// Entry point for callers: one method per use case, each run inside the
/// span of the caller's [`RequestContext`].
pub struct UserService<U, E>
where
    U: UserStore,
    E: EmailClient + 'static,
{
    user_store: Arc<U>,
    email_client: Arc<E>,
    background: BackgroundTasks,
    session_ttl: chrono::Duration,
}

impl<U, E> Clone for UserService<U, E>
where
    U: UserStore,
    E: EmailClient + 'static,
{
    fn clone(&self) -> Self {
        Self {
            user_store: self.user_store.clone(),
            email_client: self.email_client.clone(),
            background: self.background.clone(),
            session_ttl: self.session_ttl,
        }
    }
}

impl<U, E> UserService<U, E>
where
    U: UserStore,
    E: EmailClient + 'static,
{
    pub fn new(
        user_store: U,
        email_client: E,
        background: BackgroundTasks,
        session_ttl: chrono::Duration,
    ) -> Self {
        Self {
            user_store: Arc::new(user_store),
            email_client: Arc::new(email_client),
            background,
            session_ttl,
        }
    }

    pub fn user_store(&self) -> &U {
        &self.user_store
    }

    pub fn background(&self) -> &BackgroundTasks {
        &self.background
    }

    pub async fn signup(
        &self,
        ctx: &RequestContext,
        args: CreateUserArgs,
    ) -> Result<User, SignupError> {
        SignupUseCase::new(
            self.user_store.as_ref(),
            self.email_client.clone(),
            &self.background,
        )
        .execute(ctx, args)
        .instrument(ctx.span("signup"))
        .await
    }

    pub async fn login(
        &self,
        ctx: &RequestContext,
        email: &Email,
        password: &Password,
    ) -> Result<(User, UserSession), LoginError> {
        LoginUseCase::new(self.user_store.as_ref(), self.session_ttl)
            .execute(ctx, email, password)
            .instrument(ctx.span("login"))
            .await
    }

    pub async fn logout(&self, ctx: &RequestContext, session_id: Uuid) -> Result<(), LogoutError> {
        LogoutUseCase::new(self.user_store.as_ref())
            .execute(ctx, session_id)
            .instrument(ctx.span("logout"))
            .await
    }

    pub async fn authenticate_session(
        &self,
        ctx: &RequestContext,
        token: &SessionToken,
    ) -> Result<(User, UserSession), SessionError> {
        AuthenticateSessionUseCase::new(self.user_store.as_ref())
            .execute(ctx, token)
            .instrument(ctx.span("authenticate session"))
            .await
    }

    pub async fn get_user(&self, ctx: &RequestContext, id: Uuid) -> Result<User, UserStoreError> {
        self.user_store
            .get_user_by_id(ctx, id)
            .instrument(ctx.span("get user"))
            .await
    }
}
