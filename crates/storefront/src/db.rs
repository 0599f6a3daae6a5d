//! Database access for the storefront.
//!
//! The storefront keeps no domain data in `PostgreSQL`; the only table it uses
//! is the tower-sessions `sessions` table, created by:
//! ```bash
//! cargo run -p shopfront-cli -- migrate storefront
//! ```
//! Without a database URL the storefront keeps sessions in memory.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Create a `PostgreSQL` connection pool for the session store.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
