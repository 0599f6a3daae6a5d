//! Account storage.
//!
//! # Tables
//!
//! - `users` - Accounts with their Argon2 password hash
//! - `sessions` - One row per signed-in device
//! - `tokens` - Issued access and refresh tokens, keyed by SHA-256 digest
//!
//! # Migrations
//!
//! Migrations are stored in `crates/accounts/migrations/` and run via:
//! ```bash
//! cargo run -p shopfront-cli -- migrate accounts
//! ```
//!
//! Without a database URL the API runs on [`MemoryAccountStore`], which keeps
//! everything in process and forgets it on restart.

pub mod memory;
pub mod pg;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use shopfront_core::{Email, PublicUser, SessionId, TokenKind, UserId};

pub use memory::MemoryAccountStore;
pub use pg::PgAccountStore;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// A stored account.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Account fields safe to hand to clients.
    #[must_use]
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.to_string(),
            created_at: self.created_at,
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Fields for a new account.
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub password_hash: String,
}

/// Fields for a new device session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub ip_address: String,
    pub device: String,
    pub device_id: String,
    pub expires_at: DateTime<Utc>,
}

/// A signed-in device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSession {
    pub id: SessionId,
    pub user_id: UserId,
    pub ip_address: String,
    pub device: String,
    pub device_id: String,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl DeviceSession {
    /// Active and not yet expired at `now`.
    #[must_use]
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }
}

/// A token about to be stored. Only the digest of the token string is kept.
#[derive(Debug, Clone)]
pub struct NewToken {
    pub digest: String,
    pub session_id: SessionId,
    pub user_id: UserId,
    pub kind: TokenKind,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A stored token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredToken {
    pub digest: String,
    pub session_id: SessionId,
    pub user_id: UserId,
    pub kind: TokenKind,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl StoredToken {
    /// Not revoked, of the `expected` kind and not yet expired at `now`.
    #[must_use]
    pub fn is_usable_at(&self, expected: TokenKind, now: DateTime<Utc>) -> bool {
        !self.revoked && self.kind == expected && self.expires_at > now
    }
}

/// Persistence for users, device sessions and issued tokens.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Look up an account by (normalized) email.
    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError>;

    /// Look up an account by id.
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Create an account and its first device session atomically.
    ///
    /// Returns `StoreError::Conflict` if the email is already registered.
    async fn create_user_with_session(
        &self,
        user: NewUser,
        session: NewSession,
    ) -> Result<(User, DeviceSession), StoreError>;

    /// Open a new device session for an existing account.
    async fn create_session(
        &self,
        user_id: UserId,
        session: NewSession,
    ) -> Result<DeviceSession, StoreError>;

    async fn find_session(&self, id: SessionId) -> Result<Option<DeviceSession>, StoreError>;

    /// Mark a session inactive. Tokens issued for it stop validating.
    async fn deactivate_session(&self, id: SessionId) -> Result<(), StoreError>;

    /// Store freshly issued tokens.
    async fn insert_tokens(&self, tokens: &[NewToken]) -> Result<(), StoreError>;

    async fn find_token(&self, digest: &str) -> Result<Option<StoredToken>, StoreError>;

    /// Revoke a token by digest.
    ///
    /// Returns `true` only for the call that flipped the token from live to
    /// revoked; unknown or already revoked digests return `false`.
    async fn revoke_token(&self, digest: &str) -> Result<bool, StoreError>;

    /// Check the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn token(kind: TokenKind, expires_in: i64, revoked: bool) -> StoredToken {
        let now = Utc::now();
        StoredToken {
            digest: "d".to_string(),
            session_id: SessionId::new(1),
            user_id: UserId::new(1),
            kind,
            issued_at: now,
            expires_at: now + TimeDelta::seconds(expires_in),
            revoked,
        }
    }

    #[test]
    fn test_token_usable() {
        let now = Utc::now();
        assert!(token(TokenKind::Access, 60, false).is_usable_at(TokenKind::Access, now));
        assert!(!token(TokenKind::Access, 60, false).is_usable_at(TokenKind::Refresh, now));
        assert!(!token(TokenKind::Access, 60, true).is_usable_at(TokenKind::Access, now));
        assert!(!token(TokenKind::Access, -1, false).is_usable_at(TokenKind::Access, now));
    }

    #[test]
    fn test_session_live() {
        let now = Utc::now();
        let mut session = DeviceSession {
            id: SessionId::new(1),
            user_id: UserId::new(1),
            ip_address: "127.0.0.1".to_string(),
            device: "curl/8.0".to_string(),
            device_id: "abc".to_string(),
            expires_at: now + TimeDelta::days(7),
            is_active: true,
            created_at: now,
        };
        assert!(session.is_live_at(now));

        session.is_active = false;
        assert!(!session.is_live_at(now));

        session.is_active = true;
        session.expires_at = now;
        assert!(!session.is_live_at(now));
    }

    #[test]
    fn test_user_debug_redacts_hash() {
        let user = User {
            id: UserId::new(1),
            name: "John".to_string(),
            email: Email::parse("john@doe.com").unwrap(),
            password_hash: "$argon2id$secret".to_string(),
            created_at: Utc::now(),
        };
        assert!(!format!("{user:?}").contains("argon2id"));
        assert_eq!(user.to_public().email, "john@doe.com");
    }
}
