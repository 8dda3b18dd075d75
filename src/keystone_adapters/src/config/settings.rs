use std::time::Duration;

use config::{
    Config, ConfigError, Environment as EnvSource, File, builder::ConfigBuilder,
    builder::DefaultState,
};
use secrecy::Secret;
use serde::Deserialize;

use super::constants::{CONFIG_DIR, defaults, env};

/// Selects the logging mode. Fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Local,
    Production,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub environment: Environment,
    pub database: DatabaseSettings,
    pub repository: RepositorySettings,
    pub session: SessionSettings,
    pub password_hashing: PasswordHashingSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: Secret<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositorySettings {
    pub timeout_millis: u64,
}

impl RepositorySettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_millis)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    pub ttl_seconds: i64,
}

impl SessionSettings {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_seconds)
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PasswordHashingSettings {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
}

impl Settings {
    /// Loads settings from, in increasing precedence: built-in defaults,
    /// `DATABASE_URL`, `config/base.json`, `config/{APP_ENVIRONMENT}.json` and
    /// `KEYSTONE__*` environment variables. The environment itself is always
    /// taken from `APP_ENVIRONMENT`, defaulting to `local`.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = std::env::var(env::APP_ENVIRONMENT_ENV_VAR)
            .unwrap_or_else(|_| defaults::ENVIRONMENT.to_owned());

        let mut builder = Self::defaults()?;
        if let Ok(database_url) = std::env::var(env::DATABASE_URL_ENV_VAR) {
            builder = builder.set_default("database.url", database_url)?;
        }

        let builder = builder
            .set_override("environment", environment.as_str())?
            .add_source(File::with_name(&format!("{CONFIG_DIR}/base")).required(false))
            .add_source(File::with_name(&format!("{CONFIG_DIR}/{environment}")).required(false))
            .add_source(
                EnvSource::with_prefix(env::SETTINGS_ENV_PREFIX)
                    .prefix_separator(env::SETTINGS_ENV_SEPARATOR)
                    .separator(env::SETTINGS_ENV_SEPARATOR)
                    .try_parsing(true),
            );

        Self::build(builder)
    }

    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("environment", defaults::ENVIRONMENT)?
            .set_default("database.url", defaults::DATABASE_URL)?
            .set_default(
                "database.max_connections",
                defaults::DATABASE_MAX_CONNECTIONS,
            )?
            .set_default(
                "repository.timeout_millis",
                defaults::REPOSITORY_TIMEOUT_MILLIS,
            )?
            .set_default("session.ttl_seconds", defaults::SESSION_TTL_SECONDS)?
            .set_default(
                "password_hashing.memory_kib",
                defaults::PASSWORD_HASH_MEMORY_KIB,
            )?
            .set_default(
                "password_hashing.iterations",
                defaults::PASSWORD_HASH_ITERATIONS,
            )?
            .set_default(
                "password_hashing.parallelism",
                defaults::PASSWORD_HASH_PARALLELISM,
            )?
            .set_default("logging.level", defaults::LOG_LEVEL)
    }

    pub fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }
}
