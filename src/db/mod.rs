//! Database pool for the external permission and ticket collaborators.
//!
//! The hub reads tables owned by the account and board services and never
//! migrates them.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::DatabaseConfig;

/// Initialize the PostgreSQL connection pool.
///
/// # Errors
///
/// Returns an error if the initial connection fails.
pub async fn init_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.url)
        .await
}
