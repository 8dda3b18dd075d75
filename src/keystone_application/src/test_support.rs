//! Port doubles shared by the use-case tests.

use std::collections::HashMap;
use std::sync::Arc;

use keystone_core::{
    AuthProvider, CreateUserArgs, CreateUserSessionArgs, Email, EmailClient, EmailClientError,
    Password, RequestContext, SessionToken, User, UserAuth, UserSession, UserStore,
    UserStoreError,
};
use secrecy::ExposeSecret;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Keeps plaintext passwords as the credential value; good enough to check
/// how use cases react to each store outcome.
#[derive(Clone, Default)]
pub struct MockUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    sessions: Arc<RwLock<HashMap<Uuid, UserSession>>>,
    /// When set, every call fails with an infrastructure error.
    pub unavailable: bool,
}

impl MockUserStore {
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub async fn insert_session(&self, session: UserSession) {
        self.sessions.write().await.insert(session.id(), session);
    }

    pub async fn session(&self, id: Uuid) -> Option<UserSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    fn check_available(&self, operation: &'static str) -> Result<(), UserStoreError> {
        if self.unavailable {
            return Err(UserStoreError::unexpected(operation, "store unavailable"));
        }
        Ok(())
    }

    async fn find_by_email(&self, email: &Email) -> Result<User, UserStoreError> {
        self.users
            .read()
            .await
            .values()
            .find(|user| user.email() == email)
            .cloned()
            .ok_or(UserStoreError::UserNotFound)
    }
}

#[async_trait::async_trait]
impl UserStore for MockUserStore {
    async fn get_user_by_id(
        &self,
        _ctx: &RequestContext,
        id: Uuid,
    ) -> Result<User, UserStoreError> {
        self.check_available("get user by id")?;
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(UserStoreError::UserNotFound)
    }

    async fn get_user_by_email(
        &self,
        _ctx: &RequestContext,
        email: &Email,
    ) -> Result<User, UserStoreError> {
        self.check_available("get user by email")?;
        self.find_by_email(email).await
    }

    async fn get_user_by_session_token(
        &self,
        _ctx: &RequestContext,
        token: &SessionToken,
    ) -> Result<(User, UserSession), UserStoreError> {
        self.check_available("get user by session token")?;
        let session = self
            .sessions
            .read()
            .await
            .values()
            .find(|session| session.token() == token)
            .cloned()
            .ok_or(UserStoreError::UserNotFound)?;
        let user = self
            .users
            .read()
            .await
            .get(&session.user_id())
            .cloned()
            .ok_or(UserStoreError::UserNotFound)?;
        Ok((user, session))
    }

    async fn authenticate_user(
        &self,
        _ctx: &RequestContext,
        email: &Email,
        password: &Password,
    ) -> Result<User, UserStoreError> {
        self.check_available("authenticate user")?;
        let user = self.find_by_email(email).await?;
        if user.auth().value().expose_secret() == password.as_ref().expose_secret() {
            Ok(user)
        } else {
            Err(UserStoreError::IncorrectPassword)
        }
    }

    async fn create_user_password(
        &self,
        _ctx: &RequestContext,
        args: CreateUserArgs,
    ) -> Result<User, UserStoreError> {
        self.check_available("create user password")?;
        if self.find_by_email(&args.email).await.is_ok() {
            return Err(UserStoreError::DuplicateEmail);
        }
        let user = User::new(
            Uuid::new_v4(),
            args.given_name,
            args.family_name,
            args.email,
            UserAuth::new(args.password.as_ref().clone(), AuthProvider::Password),
        );
        self.users.write().await.insert(user.id(), user.clone());
        Ok(user)
    }

    async fn create_user_session(
        &self,
        _ctx: &RequestContext,
        args: CreateUserSessionArgs,
    ) -> Result<UserSession, UserStoreError> {
        self.check_available("create user session")?;
        let session = UserSession::new(
            Uuid::new_v4(),
            args.user_id,
            args.token,
            args.expires_at,
            false,
        );
        self.insert_session(session.clone()).await;
        Ok(session)
    }

    async fn expire_user_session(
        &self,
        _ctx: &RequestContext,
        session_id: Uuid,
    ) -> Result<(), UserStoreError> {
        self.check_available("expire user session")?;
        if let Some(session) = self.sessions.write().await.get_mut(&session_id) {
            session.expire_by_user();
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MockEmailClient {
    pub sent: Arc<Mutex<Vec<(Email, String)>>>,
    pub fail: bool,
}

#[async_trait::async_trait]
impl EmailClient for MockEmailClient {
    async fn send_email(
        &self,
        recipient: &Email,
        subject: &str,
        _content: &str,
    ) -> Result<(), EmailClientError> {
        if self.fail {
            return Err(EmailClientError::SendFailed("mailbox full".to_owned()));
        }
        self.sent
            .lock()
            .await
            .push((recipient.clone(), subject.to_owned()));
        Ok(())
    }
}

pub fn email(raw: &str) -> Email {
    Email::parse(raw).unwrap()
}

pub fn password(raw: &str) -> Password {
    Password::parse(raw).unwrap()
}
