use sqlx::{PgPool, migrate::MigrateError, postgres::PgPoolOptions};

/// Opens a pool without running migrations.
pub async fn get_postgres_pool(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
}

/// Applies the schema under `migrations/`. Already-applied migrations are skipped.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
