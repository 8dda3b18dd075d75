use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use keystone_core::{
    AuthProvider, CreateUserArgs, CreateUserSessionArgs, Email, Password, RequestContext,
    SessionToken, User, UserAuth, UserSession, UserStore, UserStoreError,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DEFAULT_STORE_TIMEOUT, run_bounded};
use crate::password_hashing::{Argon2PasswordHasher, PasswordHashingError};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    user_ids_by_email: HashMap<Email, Uuid>,
    sessions: HashMap<Uuid, UserSession>,
    session_ids_by_token: HashMap<SessionToken, Uuid>,
}

/// In-process store with the same contracts as the Postgres one: unique
/// emails and tokens, all-or-nothing user creation, idempotent expiry.
#[derive(Clone)]
pub struct HashMapUserStore {
    tables: Arc<RwLock<Tables>>,
    hasher: Argon2PasswordHasher,
    timeout: Duration,
}

impl HashMapUserStore {
    pub fn new(hasher: Argon2PasswordHasher) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            hasher,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn find_by_email(&self, email: &Email) -> Result<User, UserStoreError> {
        let tables = self.tables.read().await;
        tables
            .user_ids_by_email
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned()
            .ok_or(UserStoreError::UserNotFound)
    }
}

#[async_trait::async_trait]
impl UserStore for HashMapUserStore {
    async fn get_user_by_id(
        &self,
        ctx: &RequestContext,
        id: Uuid,
    ) -> Result<User, UserStoreError> {
        run_bounded(ctx, "get user by id", self.timeout, async move {
            let tables = self.tables.read().await;
            tables
                .users
                .get(&id)
                .cloned()
                .ok_or(UserStoreError::UserNotFound)
        })
        .await
    }

    async fn get_user_by_email(
        &self,
        ctx: &RequestContext,
        email: &Email,
    ) -> Result<User, UserStoreError> {
        run_bounded(ctx, "get user by email", self.timeout, async move {
            self.find_by_email(email).await
        })
        .await
    }

    async fn get_user_by_session_token(
        &self,
        ctx: &RequestContext,
        token: &SessionToken,
    ) -> Result<(User, UserSession), UserStoreError> {
        run_bounded(ctx, "get user by session token", self.timeout, async move {
            let tables = self.tables.read().await;
            let session = tables
                .session_ids_by_token
                .get(token)
                .and_then(|id| tables.sessions.get(id))
                .ok_or(UserStoreError::UserNotFound)?;
            let user = tables
                .users
                .get(&session.user_id())
                .ok_or(UserStoreError::UserNotFound)?;
            Ok((user.clone(), session.clone()))
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
            let user = self.find_by_email(email).await?;
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
            let password_hash = self
                .hasher
                .compute_password_hash(args.password)
                .await
                .map_err(|e| UserStoreError::unexpected(OPERATION, e))?;

            // Both rows land under the same write guard.
            let mut tables = self.tables.write().await;
            if tables.user_ids_by_email.contains_key(&args.email) {
                return Err(UserStoreError::DuplicateEmail);
            }

            let user = User::new(
                Uuid::new_v4(),
                args.given_name,
                args.family_name,
                args.email,
                UserAuth::new(password_hash, AuthProvider::Password),
            );
            tables
                .user_ids_by_email
                .insert(user.email().clone(), user.id());
            tables.users.insert(user.id(), user.clone());
            Ok(user)
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
            let mut tables = self.tables.write().await;
            if !tables.users.contains_key(&args.user_id) {
                return Err(UserStoreError::unexpected(
                    OPERATION,
                    "session owner does not exist",
                ));
            }
            if tables.session_ids_by_token.contains_key(&args.token) {
                return Err(UserStoreError::unexpected(
                    OPERATION,
                    "session token is already in use",
                ));
            }

            let session = UserSession::new(
                Uuid::new_v4(),
                args.user_id,
                args.token,
                args.expires_at,
                false,
            );
            tables
                .session_ids_by_token
                .insert(session.token().clone(), session.id());
            tables.sessions.insert(session.id(), session.clone());
            Ok(session)
        })
        .await
    }

    async fn expire_user_session(
        &self,
        ctx: &RequestContext,
        session_id: Uuid,
    ) -> Result<(), UserStoreError> {
        run_bounded(ctx, "expire user session", self.timeout, async move {
            let mut tables = self.tables.write().await;
            match tables.sessions.get_mut(&session_id) {
                Some(session) => session.expire_by_user(),
                None => tracing::debug!(%session_id, "No session to expire"),
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, Utc};
    use fake::{Fake, faker::internet::en::SafeEmail};
    use secrecy::ExposeSecret;

    use super::*;
    use crate::config::PasswordHashingSettings;
    use crate::password_hashing::tests::fast_hasher;

    const PASSWORD: &str = "correct horse battery";

    fn store() -> HashMapUserStore {
        HashMapUserStore::new(fast_hasher())
    }

    fn random_email() -> Email {
        Email::parse(SafeEmail().fake::<String>()).unwrap()
    }

    fn create_args(email: Email) -> CreateUserArgs {
        CreateUserArgs {
            given_name: Some("Ada".to_owned()),
            family_name: None,
            email,
            password: Password::parse(PASSWORD).unwrap(),
        }
    }

    async fn create_user(store: &HashMapUserStore, ctx: &RequestContext) -> User {
        store
            .create_user_password(ctx, create_args(random_email()))
            .await
            .unwrap()
    }

    fn session_args(user_id: Uuid, token: SessionToken) -> CreateUserSessionArgs {
        CreateUserSessionArgs {
            user_id,
            token,
            expires_at: Utc::now() + ChronoDuration::hours(1),
        }
    }

    #[tokio::test]
    async fn stored_credential_is_a_verifiable_hash_not_the_plaintext() {
        let store = store();
        let ctx = RequestContext::new();
        let email = random_email();

        store
            .create_user_password(&ctx, create_args(email.clone()))
            .await
            .unwrap();
        let user = store.get_user_by_email(&ctx, &email).await.unwrap();

        assert_eq!(user.given_name(), Some("Ada"));
        assert_eq!(user.auth().provider(), AuthProvider::Password);
        assert_ne!(user.auth().value().expose_secret(), PASSWORD);
        fast_hasher()
            .verify_password_hash(
                user.auth().value().clone(),
                Password::parse(PASSWORD).unwrap(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn second_signup_with_same_email_is_duplicate_and_keeps_first_user() {
        let store = store();
        let ctx = RequestContext::new();
        let email = random_email();

        let first = store
            .create_user_password(&ctx, create_args(email.clone()))
            .await
            .unwrap();
        let second = store
            .create_user_password(&ctx, create_args(email.clone()))
            .await;

        assert_eq!(second.unwrap_err(), UserStoreError::DuplicateEmail);
        let stored = store.get_user_by_email(&ctx, &email).await.unwrap();
        assert_eq!(stored.id(), first.id());
        assert_eq!(store.tables.read().await.users.len(), 1);
    }

    #[tokio::test]
    async fn unknown_ids_and_emails_are_not_found() {
        let store = store();
        let ctx = RequestContext::new();

        assert_eq!(
            store.get_user_by_id(&ctx, Uuid::new_v4()).await.unwrap_err(),
            UserStoreError::UserNotFound
        );
        assert_eq!(
            store
                .get_user_by_email(&ctx, &random_email())
                .await
                .unwrap_err(),
            UserStoreError::UserNotFound
        );
        assert_eq!(
            store
                .get_user_by_session_token(&ctx, &SessionToken::generate())
                .await
                .unwrap_err(),
            UserStoreError::UserNotFound
        );
    }

    #[tokio::test]
    async fn authenticate_user_checks_the_password() {
        let store = store();
        let ctx = RequestContext::new();
        let user = create_user(&store, &ctx).await;

        let authenticated = store
            .authenticate_user(&ctx, user.email(), &Password::parse(PASSWORD).unwrap())
            .await
            .unwrap();
        assert_eq!(authenticated.id(), user.id());

        let wrong = store
            .authenticate_user(&ctx, user.email(), &Password::parse("not the password").unwrap())
            .await;
        assert_eq!(wrong.unwrap_err(), UserStoreError::IncorrectPassword);
    }

    #[tokio::test]
    async fn expiring_twice_or_expiring_unknown_sessions_succeeds() {
        let store = store();
        let ctx = RequestContext::new();
        let user = create_user(&store, &ctx).await;
        let session = store
            .create_user_session(&ctx, session_args(user.id(), SessionToken::generate()))
            .await
            .unwrap();

        store.expire_user_session(&ctx, session.id()).await.unwrap();
        store.expire_user_session(&ctx, session.id()).await.unwrap();
        store
            .expire_user_session(&ctx, Uuid::new_v4())
            .await
            .unwrap();

        let (_, stored) = store
            .get_user_by_session_token(&ctx, session.token())
            .await
            .unwrap();
        assert!(stored.expired_by_user());
        assert_eq!(stored.expires_at(), session.expires_at());
    }

    #[tokio::test]
    async fn time_expired_session_is_still_returned_as_stored() {
        let store = store();
        let ctx = RequestContext::new();
        let user = create_user(&store, &ctx).await;
        let expires_at = Utc::now() - ChronoDuration::minutes(10);
        let token = SessionToken::generate();

        store
            .create_user_session(
                &ctx,
                CreateUserSessionArgs {
                    user_id: user.id(),
                    token: token.clone(),
                    expires_at,
                },
            )
            .await
            .unwrap();

        let (owner, session) = store
            .get_user_by_session_token(&ctx, &token)
            .await
            .unwrap();
        assert_eq!(owner.id(), user.id());
        assert_eq!(session.expires_at(), expires_at);
        assert!(!session.expired_by_user());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sessions_with_distinct_tokens_all_succeed() {
        let store = store();
        let ctx = RequestContext::new();
        let user = create_user(&store, &ctx).await;

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                let ctx = ctx.clone();
                let args = session_args(user.id(), SessionToken::generate());
                tokio::spawn(async move { store.create_user_session(&ctx, args).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.tables.read().await.sessions.len(), 32);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn racing_on_the_same_token_yields_one_success_and_one_infrastructure_error() {
        let store = store();
        let ctx = RequestContext::new();
        let user = create_user(&store, &ctx).await;
        let token = SessionToken::generate();

        let first = tokio::spawn({
            let (store, ctx) = (store.clone(), ctx.clone());
            let args = session_args(user.id(), token.clone());
            async move { store.create_user_session(&ctx, args).await }
        });
        let second = tokio::spawn({
            let (store, ctx) = (store.clone(), ctx.clone());
            let args = session_args(user.id(), token.clone());
            async move { store.create_user_session(&ctx, args).await }
        });

        let results = [first.await.unwrap(), second.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(UserStoreError::is_infrastructure)
        );
    }

    #[tokio::test]
    async fn past_deadline_fails_every_call_without_touching_the_store() {
        let store = store();
        let ctx = RequestContext::new();
        let existing = create_user(&store, &ctx).await;
        let expired =
            RequestContext::new().with_deadline(std::time::Instant::now() - Duration::from_secs(1));

        for _ in 0..50 {
            let email = random_email();
            let created = store
                .create_user_password(&expired, create_args(email.clone()))
                .await;
            assert_eq!(
                created.unwrap_err(),
                UserStoreError::Timeout {
                    operation: "create user password"
                }
            );
            assert_eq!(
                store.get_user_by_email(&ctx, &email).await.unwrap_err(),
                UserStoreError::UserNotFound
            );
        }

        // Reads that would succeed are refused as well.
        assert_eq!(
            store
                .get_user_by_id(&expired, existing.id())
                .await
                .unwrap_err(),
            UserStoreError::Timeout {
                operation: "get user by id"
            }
        );
        assert_eq!(store.tables.read().await.users.len(), 1);
    }

    #[tokio::test]
    async fn deadline_passing_while_hashing_persists_nothing() {
        let hasher = Argon2PasswordHasher::new(&PasswordHashingSettings {
            memory_kib: 15_000,
            iterations: 2,
            parallelism: 1,
        })
        .unwrap();
        let store = HashMapUserStore::new(hasher);
        let email = random_email();
        let short = RequestContext::new().with_timeout(Duration::from_millis(1));

        let result = store
            .create_user_password(&short, create_args(email.clone()))
            .await;

        assert_eq!(
            result.unwrap_err(),
            UserStoreError::Timeout {
                operation: "create user password"
            }
        );
        // Give the abandoned hashing job time to finish on the blocking pool.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(
            store
                .get_user_by_email(&RequestContext::new(), &email)
                .await
                .unwrap_err(),
            UserStoreError::UserNotFound
        );
        assert!(store.tables.read().await.users.is_empty());
    }
}
