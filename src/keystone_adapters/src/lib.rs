pub mod config;
pub mod db;
pub mod email;
pub mod password_hashing;
pub mod persistence;
pub mod telemetry;

pub use config::{Environment, Settings};
pub use db::{get_postgres_pool, run_migrations};
pub use email::TracingEmailClient;
pub use password_hashing::{Argon2PasswordHasher, PasswordHashingError};
pub use persistence::{HashMapUserStore, PostgresUserStore, classify_sqlx_error};
pub use telemetry::{LogFormat, init_tracing};
