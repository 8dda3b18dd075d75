use std::sync::Arc;

use keystone_core::{CreateUserArgs, EmailClient, RequestContext, User, UserStore, UserStoreError};

use crate::background::BackgroundTasks;

pub const WELCOME_SUBJECT: &str = "Welcome";

#[derive(Debug, thiserror::Error)]
pub enum SignupError {
    #[error("Email address is already registered")]
    DuplicateEmail,
    #[error("User store error: {0}")]
    Store(#[source] UserStoreError),
}

impl From<UserStoreError> for SignupError {
    fn from(error: UserStoreError) -> Self {
        match error {
            UserStoreError::DuplicateEmail => SignupError::DuplicateEmail,
            other => SignupError::Store(other),
        }
    }
}

/// Signup use case - creates a password account and schedules the welcome email
pub struct SignupUseCase<'a, U, E>
where
    U: UserStore,
    E: EmailClient + 'static,
{
    user_store: &'a U,
    email_client: Arc<E>,
    background: &'a BackgroundTasks,
}

impl<'a, U, E> SignupUseCase<'a, U, E>
where
    U: UserStore,
    E: EmailClient + 'static,
{
    pub fn new(user_store: &'a U, email_client: Arc<E>, background: &'a BackgroundTasks) -> Self {
        Self {
            user_store,
            email_client,
            background,
        }
    }

    /// The account exists once this returns `Ok`; the welcome email is sent
    /// afterwards and its failure does not undo the signup.
    #[tracing::instrument(name = "SignupUseCase::execute", skip_all)]
    pub async fn execute(
        &self,
        ctx: &RequestContext,
        args: CreateUserArgs,
    ) -> Result<User, SignupError> {
        let user = self.user_store.create_user_password(ctx, args).await?;

        let email_client = self.email_client.clone();
        let recipient = user.email().clone();
        let greeting = match user.given_name() {
            Some(name) => format!("Hello {name}, your account is ready."),
            None => "Hello, your account is ready.".to_owned(),
        };
        self.background.spawn("send welcome email", async move {
            email_client
                .send_email(&recipient, WELCOME_SUBJECT, &greeting)
                .await
        });

        Ok(user)
    }
}
