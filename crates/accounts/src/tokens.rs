//! Opaque access and refresh tokens.
//!
//! A token is 256 random bits, base64url encoded. The store only ever sees
//! the hex SHA-256 digest, so a leaked `tokens` table cannot be replayed.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeDelta, Utc};
use sha2::{Digest, Sha256};

use shopfront_core::TokenKind;

use crate::store::{DeviceSession, NewToken};

/// Access token lifetime in seconds (15 minutes).
pub const ACCESS_TOKEN_TTL_SECS: i64 = 15 * 60;

/// Refresh token and device session lifetime in seconds (7 days).
pub const REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Lifetime of a token of `kind`.
#[must_use]
pub const fn ttl_secs(kind: TokenKind) -> i64 {
    match kind {
        TokenKind::Access => ACCESS_TOKEN_TTL_SECS,
        TokenKind::Refresh => REFRESH_TOKEN_TTL_SECS,
    }
}

/// Generate a fresh token string.
#[must_use]
pub fn generate() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex SHA-256 digest of a token string.
#[must_use]
pub fn digest(token: &str) -> String {
    Sha256::digest(token.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Generate a random device id: 128 bits as lowercase hex.
#[must_use]
pub fn generate_device_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// A token string together with the record to store for it.
pub struct IssuedToken {
    pub token: String,
    pub record: NewToken,
}

/// Issue a token of `kind` for `session`.
#[must_use]
pub fn issue(kind: TokenKind, session: &DeviceSession, now: DateTime<Utc>) -> IssuedToken {
    let token = generate();
    let record = NewToken {
        digest: digest(&token),
        session_id: session.id,
        user_id: session.user_id,
        kind,
        issued_at: now,
        expires_at: now + TimeDelta::seconds(ttl_secs(kind)),
    };
    IssuedToken { token, record }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shopfront_core::{SessionId, UserId};

    use super::*;

    #[test]
    fn test_generate_is_url_safe_and_unique() {
        let a = generate();
        let b = generate();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_digest() {
        assert_eq!(
            digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_device_id() {
        let id = generate_device_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_issue() {
        let now = Utc::now();
        let session = DeviceSession {
            id: SessionId::new(3),
            user_id: UserId::new(7),
            ip_address: "127.0.0.1".to_string(),
            device: "Unknown Device".to_string(),
            device_id: generate_device_id(),
            expires_at: now + TimeDelta::seconds(REFRESH_TOKEN_TTL_SECS),
            is_active: true,
            created_at: now,
        };

        let access = issue(TokenKind::Access, &session, now);
        assert_eq!(access.record.digest, digest(&access.token));
        assert_eq!(access.record.session_id, session.id);
        assert_eq!(access.record.user_id, session.user_id);
        assert_eq!(
            (access.record.expires_at - now).num_seconds(),
            ACCESS_TOKEN_TTL_SECS
        );

        let refresh = issue(TokenKind::Refresh, &session, now);
        assert_eq!(
            (refresh.record.expires_at - now).num_minutes(),
            7 * 24 * 60
        );
    }
}
