//! `PostgreSQL` account store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use shopfront_core::{Email, SessionId, TokenKind, UserId};

use super::{
    AccountStore, DeviceSession, NewSession, NewToken, NewUser, StoreError, StoredToken, User,
};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    name: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email)
            .map_err(|e| StoreError::DataCorruption(format!("invalid email in database: {e}")))?;

        Ok(Self {
            id: UserId::new(row.id),
            name: row.name,
            email,
            password_hash: row.password_hash,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: i32,
    user_id: i32,
    ip_address: String,
    device: String,
    device_id: String,
    expires_at: DateTime<Utc>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<SessionRow> for DeviceSession {
    fn from(row: SessionRow) -> Self {
        Self {
            id: SessionId::new(row.id),
            user_id: UserId::new(row.user_id),
            ip_address: row.ip_address,
            device: row.device,
            device_id: row.device_id,
            expires_at: row.expires_at,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TokenRow {
    digest: String,
    session_id: i32,
    user_id: i32,
    kind: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked: bool,
}

impl TryFrom<TokenRow> for StoredToken {
    type Error = StoreError;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        let kind = row
            .kind
            .parse::<TokenKind>()
            .map_err(StoreError::DataCorruption)?;

        Ok(Self {
            digest: row.digest,
            session_id: SessionId::new(row.session_id),
            user_id: UserId::new(row.user_id),
            kind,
            issued_at: row.issued_at,
            expires_at: row.expires_at,
            revoked: row.revoked,
        })
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at";
const SESSION_COLUMNS: &str =
    "id, user_id, ip_address, device, device_id, expires_at, is_active, created_at";

// =============================================================================
// Store
// =============================================================================

/// Account store over a `PostgreSQL` pool.
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn insert_session_sql() -> String {
    format!(
        "INSERT INTO sessions (user_id, ip_address, device, device_id, expires_at) \
         VALUES ($1, $2, $3, $4, $5) RETURNING {SESSION_COLUMNS}"
    )
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn create_user_with_session(
        &self,
        user: NewUser,
        session: NewSession,
    ) -> Result<(User, DeviceSession), StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.name)
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::Conflict("email already exists".to_owned());
            }
            StoreError::Database(e)
        })?;
        let user = User::try_from(row)?;

        let session = sqlx::query_as::<_, SessionRow>(&insert_session_sql())
            .bind(user.id.as_i32())
            .bind(&session.ip_address)
            .bind(&session.device)
            .bind(&session.device_id)
            .bind(session.expires_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((user, session.into()))
    }

    async fn create_session(
        &self,
        user_id: UserId,
        session: NewSession,
    ) -> Result<DeviceSession, StoreError> {
        let row = sqlx::query_as::<_, SessionRow>(&insert_session_sql())
            .bind(user_id.as_i32())
            .bind(&session.ip_address)
            .bind(&session.device)
            .bind(&session.device_id)
            .bind(session.expires_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_foreign_key_violation()
                {
                    return StoreError::NotFound;
                }
                StoreError::Database(e)
            })?;

        Ok(row.into())
    }

    async fn find_session(&self, id: SessionId) -> Result<Option<DeviceSession>, StoreError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn deactivate_session(&self, id: SessionId) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE sessions SET is_active = FALSE, updated_at = now() WHERE id = $1")
                .bind(id.as_i32())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn insert_tokens(&self, tokens: &[NewToken]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for token in tokens {
            sqlx::query(
                "INSERT INTO tokens (digest, session_id, user_id, kind, issued_at, expires_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(&token.digest)
            .bind(token.session_id.as_i32())
            .bind(token.user_id.as_i32())
            .bind(token.kind.as_str())
            .bind(token.issued_at)
            .bind(token.expires_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find_token(&self, digest: &str) -> Result<Option<StoredToken>, StoreError> {
        let row = sqlx::query_as::<_, TokenRow>(
            "SELECT digest, session_id, user_id, kind, issued_at, expires_at, revoked \
             FROM tokens WHERE digest = $1",
        )
        .bind(digest)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn revoke_token(&self, digest: &str) -> Result<bool, StoreError> {
        let result =
            sqlx::query("UPDATE tokens SET revoked = TRUE WHERE digest = $1 AND revoked = FALSE")
                .bind(digest)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
