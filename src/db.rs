//! Postgres connection pool and schema migrations.
//!
//! Only used when `DATABASE_URL` is configured; the in-memory store needs neither.

use sqlx::{Pool, Postgres};

/// Shared Postgres pool handed to [`crate::store::PgStore`].
pub type DbPool = Pool<Postgres>;

/// Open the connection pool.
///
/// Rental operations hold a handful of short queries each, so a small pool
/// is enough for a single campus service instance.
///
/// # Errors
///
/// Fails when the connection string is malformed or the server refuses the
/// connection.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
}

/// Apply the schema and seed migrations embedded from `./migrations`.
///
/// Applied migrations are recorded in `_sqlx_migrations`, so restarting the
/// service never re-seeds the fleet.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
