//! PostgreSQL pool setup and schema migrations.

use sqlx::{Pool, Postgres, postgres::PgPoolOptions};

pub type DbPool = Pool<Postgres>;

/// Connect a pool of at most `max_connections` connections.
///
/// Ledger writes hold a connection for one statement, or for one short
/// transaction over two rows, so a small pool goes a long way.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Apply the embedded migrations under `migrations/`.
///
/// They create `users`, `accounts` and the `account_number_seq` sequence
/// that hands out account numbers. Applied versions are recorded in
/// `_sqlx_migrations`, so re-running at startup is harmless.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
