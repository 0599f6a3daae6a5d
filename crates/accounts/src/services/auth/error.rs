//! Authentication error types.

use thiserror::Error;

use shopfront_core::TokenKind;

use crate::store::StoreError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A required registration field was empty.
    #[error("name, email and password are required")]
    MissingRegistrationFields,

    /// A required login field was empty.
    #[error("email and password are required")]
    MissingLoginFields,

    /// Registration details failed validation.
    #[error("invalid registration: {0}")]
    Invalid(String),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// No token of this kind was presented.
    #[error("{0} token required")]
    MissingToken(TokenKind),

    /// The token is unknown, revoked, expired or of the wrong kind.
    #[error("invalid {0} token")]
    InvalidToken(TokenKind),

    /// The token's session has ended.
    #[error("invalid session")]
    InvalidSession,

    /// Store/database error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
