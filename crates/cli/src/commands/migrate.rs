//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! # Create the accounts tables (users, sessions, tokens)
//! shopfront migrate accounts
//!
//! # Create the storefront session table
//! shopfront migrate storefront
//!
//! # Both
//! shopfront migrate all
//! ```
//!
//! # Environment Variables
//!
//! - `ACCOUNTS_DATABASE_URL` - `PostgreSQL` connection string for accounts
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string for sessions
//! - `DATABASE_URL` - Fallback for either
//!
//! Accounts migrations live in `crates/accounts/migrations/`. The storefront
//! table is owned by `tower-sessions-sqlx-store`.

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use thiserror::Error;
use tower_sessions_sqlx_store::PostgresStore;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0} (or DATABASE_URL)")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Database URL from `key`, falling back to `DATABASE_URL`.
fn database_url(key: &'static str) -> Result<SecretString, MigrationError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
        .ok_or(MigrationError::MissingEnvVar(key))
}

async fn connect(key: &'static str) -> Result<PgPool, MigrationError> {
    let url = database_url(key)?;
    Ok(PgPool::connect(url.expose_secret()).await?)
}

/// Run accounts database migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the database is unreachable or a migration fails.
pub async fn accounts() -> Result<(), MigrationError> {
    tracing::info!("Connecting to accounts database...");
    let pool = connect("ACCOUNTS_DATABASE_URL").await?;

    tracing::info!("Running accounts migrations...");
    sqlx::migrate!("../accounts/migrations").run(&pool).await?;

    tracing::info!("Accounts migrations complete");
    Ok(())
}

/// Create the storefront session table.
///
/// # Errors
///
/// Returns `MigrationError` if the database is unreachable or the table
/// cannot be created.
pub async fn storefront() -> Result<(), MigrationError> {
    tracing::info!("Connecting to storefront database...");
    let pool = connect("STOREFRONT_DATABASE_URL").await?;

    tracing::info!("Creating session table...");
    PostgresStore::new(pool).migrate().await?;

    tracing::info!("Storefront migrations complete");
    Ok(())
}
