//! Token extraction and the authenticated-request extractor.
//!
//! A token is read from `Authorization: Bearer <token>` first and from the
//! matching cookie otherwise.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::{HeaderMap, header::AUTHORIZATION, request::Parts};
use axum_extra::extract::cookie::CookieJar;

use shopfront_core::TokenKind;

use crate::cookies::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::error::ApiError;
use crate::services::{AuthError, Authenticated};
use crate::state::AppState;

/// Token from the `Authorization` header, if any.
fn bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Token from the named cookie, if any.
fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(name)
        .map(|c| c.value().trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The token of `kind` a request presents: bearer header first, then cookie.
#[must_use]
pub fn presented_token(headers: &HeaderMap, kind: TokenKind) -> Option<String> {
    bearer(headers).or_else(|| cookie(headers, cookie_name(kind)))
}

/// The refresh token cookie, ignoring the `Authorization` header.
#[must_use]
pub fn refresh_cookie(headers: &HeaderMap) -> Option<String> {
    cookie(headers, REFRESH_TOKEN_COOKIE)
}

const fn cookie_name(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Access => ACCESS_TOKEN_COOKIE,
        TokenKind::Refresh => REFRESH_TOKEN_COOKIE,
    }
}

/// Extractor that requires a valid access token.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(auth): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", auth.user.name)
/// }
/// ```
pub struct RequireAuth(pub Authenticated);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = presented_token(&parts.headers, TokenKind::Access)
            .ok_or(AuthError::MissingToken(TokenKind::Access))?;

        let state = AppState::from_ref(state);
        let auth = state
            .auth()
            .authenticate(&token, TokenKind::Access)
            .await
            .map_err(|e| match e {
                AuthError::InvalidSession => AuthError::InvalidToken(TokenKind::Access),
                other => other,
            })?;

        Ok(Self(auth))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{HeaderValue, header::COOKIE};

    use super::*;

    fn headers(pairs: &[(axum::http::HeaderName, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn test_bearer_takes_priority() {
        let h = headers(&[
            (AUTHORIZATION, "Bearer from-header"),
            (COOKIE, "access_token=from-cookie; refresh_token=r"),
        ]);
        assert_eq!(
            presented_token(&h, TokenKind::Access).as_deref(),
            Some("from-header")
        );
        assert_eq!(refresh_cookie(&h).as_deref(), Some("r"));
    }

    #[test]
    fn test_cookie_fallback() {
        let h = headers(&[(COOKIE, "access_token=a; refresh_token=r")]);
        assert_eq!(presented_token(&h, TokenKind::Access).as_deref(), Some("a"));
        assert_eq!(presented_token(&h, TokenKind::Refresh).as_deref(), Some("r"));
    }

    #[test]
    fn test_raw_authorization_value() {
        let h = headers(&[(AUTHORIZATION, "raw-token")]);
        assert_eq!(
            presented_token(&h, TokenKind::Refresh).as_deref(),
            Some("raw-token")
        );
    }

    #[test]
    fn test_missing_token() {
        assert!(presented_token(&HeaderMap::new(), TokenKind::Access).is_none());
        let h = headers(&[(AUTHORIZATION, "Bearer "), (COOKIE, "access_token=")]);
        assert!(presented_token(&h, TokenKind::Access).is_none());
    }
}
