//! API error responses with Sentry integration.
//!
//! Every failure leaves the API as `{ "error": <status text>, "message": ... }`.
//! Server-side failures are captured to Sentry and answered with a generic
//! message.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use shopfront_core::TokenKind;

use crate::services::auth::AuthError;
use crate::services::products::CatalogError;
use crate::store::StoreError;

/// Application-level error type for the accounts API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or incomplete request.
    #[error("{0}")]
    BadRequest(String),

    /// Missing or rejected credentials.
    #[error("{0}")]
    Unauthorized(String),

    /// Resource already exists.
    #[error("{0}")]
    Conflict(String),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Store(_) | Self::Internal(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Store(_) | Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        let body = ErrorBody {
            error: status.canonical_reason().unwrap_or("Error"),
            message: &message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingRegistrationFields => {
                Self::BadRequest("Name, Email and Password are required".to_string())
            }
            AuthError::MissingLoginFields => {
                Self::BadRequest("Email and Password are required".to_string())
            }
            AuthError::Invalid(message) => Self::BadRequest(message),
            AuthError::InvalidCredentials => {
                Self::Unauthorized("Invalid email or password".to_string())
            }
            AuthError::UserAlreadyExists => Self::Conflict("User already exists".to_string()),
            AuthError::MissingToken(kind) => Self::Unauthorized(format!("{} required", label(kind))),
            AuthError::InvalidToken(kind) => {
                Self::Unauthorized(format!("Invalid {}", label(kind).to_lowercase()))
            }
            AuthError::InvalidSession => Self::Unauthorized("Invalid session".to_string()),
            AuthError::Store(e) => Self::Store(e),
            AuthError::PasswordHash => Self::Internal("Failed to hash password".to_string()),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        tracing::error!("Failed to load products: {err}");
        Self::NotFound("Products not found".to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected request body: {rejection}");
        Self::BadRequest("Invalid JSON format".to_string())
    }
}

const fn label(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Access => "Access token",
        TokenKind::Refresh => "Refresh token",
    }
}

/// Result type alias for `ApiError`.
pub type Result<T> = std::result::Result<T, ApiError>;
