use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr};
use keystone_adapters::{
    Argon2PasswordHasher, HashMapUserStore, LogFormat, PostgresUserStore, Settings,
    TracingEmailClient, get_postgres_pool, init_tracing, run_migrations,
};
use keystone_application::{BackgroundTasks, UserService};
use keystone_core::UserStore;
use secrecy::ExposeSecret;
use sqlx::PgPool;

pub type PostgresKeystone = Keystone<PostgresUserStore>;
pub type InMemoryKeystone = Keystone<HashMapUserStore>;

/// A wired [`UserService`] plus the resources that have to be released with it.
pub struct Keystone<U>
where
    U: UserStore,
{
    service: UserService<U, TracingEmailClient>,
    pool: Option<PgPool>,
}

impl Keystone<PostgresUserStore> {
    /// Connects to Postgres, applies pending migrations and wires the service.
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let hasher = Argon2PasswordHasher::new(&settings.password_hashing)
            .wrap_err("Invalid password hashing settings")?;

        let pool = get_postgres_pool(
            settings.database.url.expose_secret(),
            settings.database.max_connections,
        )
        .await
        .wrap_err("Failed to create Postgres connection pool")?;

        run_migrations(&pool)
            .await
            .wrap_err("Failed to run migrations")?;

        let user_store =
            PostgresUserStore::new(pool.clone(), hasher).with_timeout(settings.repository.timeout());

        tracing::info!(
            max_connections = settings.database.max_connections,
            "Connected to Postgres"
        );
        Ok(Self {
            service: Self::wire(user_store, settings),
            pool: Some(pool),
        })
    }
}

impl Keystone<HashMapUserStore> {
    /// Same wiring over process memory; nothing survives a restart.
    pub fn in_memory(settings: &Settings) -> Result<Self> {
        let hasher = Argon2PasswordHasher::new(&settings.password_hashing)
            .wrap_err("Invalid password hashing settings")?;
        let user_store = HashMapUserStore::new(hasher).with_timeout(settings.repository.timeout());

        Ok(Self {
            service: Self::wire(user_store, settings),
            pool: None,
        })
    }
}

impl<U> Keystone<U>
where
    U: UserStore,
{
    fn wire(user_store: U, settings: &Settings) -> UserService<U, TracingEmailClient> {
        UserService::new(
            user_store,
            TracingEmailClient::new(),
            BackgroundTasks::new(),
            settings.session.ttl(),
        )
    }

    pub fn user_service(&self) -> &UserService<U, TracingEmailClient> {
        &self.service
    }

    /// Drains background tasks for at most `timeout`, then closes the pool.
    /// Returns whether every background task finished.
    pub async fn shutdown(self, timeout: Duration) -> bool {
        let drained = self.service.background().shutdown(timeout).await;
        if let Some(pool) = self.pool {
            pool.close().await;
        }
        tracing::info!(drained, "Keystone shut down");
        drained
    }
}

/// Process start-up: error reporting, settings, logging, then Postgres.
/// Call once; a second call fails because the subscriber is already set.
pub async fn bootstrap() -> Result<PostgresKeystone> {
    color_eyre::install()?;

    let settings = Settings::load().wrap_err("Failed to load settings")?;
    init_tracing(LogFormat::from(settings.environment), &settings.logging)?;

    PostgresKeystone::connect(&settings).await
}
