//! Authentication extractors and session helpers.
//!
//! The signed-in user is the `SessionUser` the accounts API returned from
//! `/me`, cached in the session next to the token pair. Once its `exp` has
//! passed, the extractors try one token refresh; if that fails the visitor is
//! signed out and told so with a toast.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, HeaderValue, Method, StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use tower_sessions::Session;

use shopfront_core::SessionUser;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::flash;
use crate::models::{SessionTokens, session_keys};
use crate::services::AccountsError;
use crate::state::AppState;

/// Toast shown when an expired session could not be refreshed.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// Extractor that requires a signed-in user.
///
/// If nobody is signed in, redirects to the login page (or answers 401 with
/// an `HX-Redirect` header for HTMX requests). Page loads come back to the
/// same URL after signing in.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct RequireAuth(pub SessionUser);

/// Error returned when authentication is required but nobody is signed in.
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests), with the page to return to.
    RedirectToLogin(Option<String>),
    /// Unauthorized response telling HTMX where to go.
    HtmxRedirect,
    /// The session layer is missing.
    NoSession,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(None) => Redirect::to("/auth/login").into_response(),
            Self::RedirectToLogin(Some(next)) => Redirect::to(&format!(
                "/auth/login?next={}",
                urlencoding::encode(&next)
            ))
            .into_response(),
            Self::HtmxRedirect => (
                StatusCode::UNAUTHORIZED,
                [("HX-Redirect", HeaderValue::from_static("/auth/login"))],
            )
                .into_response(),
            Self::NoSession => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AuthRejection::NoSession)?;
        let state = AppState::from_ref(state);

        current_user(&session, &state).await.map(Self).ok_or_else(|| {
            if is_htmx(&parts.headers) {
                AuthRejection::HtmxRedirect
            } else {
                let next = (parts.method == Method::GET)
                    .then(|| parts.uri.path_and_query().map(ToString::to_string))
                    .flatten();
                AuthRejection::RedirectToLogin(next)
            }
        })
    }
}

/// Extractor that optionally gets the signed-in user.
///
/// Unlike `RequireAuth`, this does not reject the request if nobody is signed in.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(OptionalAuth(user): OptionalAuth) -> impl IntoResponse {
///     match user {
///         Some(u) => format!("Hello, {}!", u.name),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
pub struct OptionalAuth(pub Option<SessionUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>().cloned() {
            Some(session) => current_user(&session, &AppState::from_ref(state)).await,
            None => None,
        };

        Ok(Self(user))
    }
}

/// Whether the request was made by HTMX.
#[must_use]
pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("HX-Request")
        .is_some_and(|v| v.as_bytes() == b"true")
}

/// Resolve the signed-in user, refreshing an expired session once.
async fn current_user(session: &Session, state: &AppState) -> Option<SessionUser> {
    let user: SessionUser = session
        .get(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()?;

    if !user.is_expired_at(Utc::now()) {
        return Some(user);
    }

    tracing::debug!(user_id = %user.id, "Session token expired, attempting refresh");
    match refresh(session, state).await {
        Ok(user) => Some(user),
        Err(e) => {
            tracing::info!(user_id = %user.id, "Refresh failed, signing out: {e}");
            if let Err(e) = clear_auth(session).await {
                tracing::error!("Failed to clear expired session: {e}");
            }
            flash::info(session, SESSION_EXPIRED_MESSAGE).await;
            None
        }
    }
}

/// Reasons an expired session could not be renewed.
#[derive(Debug, thiserror::Error)]
enum RefreshError {
    #[error("no refresh token in session")]
    NoTokens,
    #[error(transparent)]
    Accounts(#[from] AccountsError),
    #[error(transparent)]
    Session(#[from] tower_sessions::session::Error),
}

async fn refresh(session: &Session, state: &AppState) -> Result<SessionUser, RefreshError> {
    let tokens: SessionTokens = session
        .get(session_keys::TOKENS)
        .await?
        .ok_or(RefreshError::NoTokens)?;

    let issued = state.accounts().refresh(&tokens.refresh_token).await?;
    let tokens = SessionTokens {
        access_token: issued.access_token,
        refresh_token: issued.refresh_token,
    };
    let user = state.accounts().me(&tokens.access_token).await?;

    set_current_user(session, &user, &tokens).await?;
    Ok(user)
}

/// Store the signed-in user and their tokens in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &SessionUser,
    tokens: &SessionTokens,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::TOKENS, tokens).await?;
    session.insert(session_keys::CURRENT_USER, user).await?;
    set_sentry_user(&user.id, Some(&user.email));
    Ok(())
}

/// Remove the signed-in user, their tokens and the shipping form.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_auth(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<SessionUser>(session_keys::CURRENT_USER)
        .await?;
    session
        .remove::<SessionTokens>(session_keys::TOKENS)
        .await?;
    session
        .remove::<serde_json::Value>(session_keys::SHIPPING_FORM)
        .await?;
    clear_sentry_user();
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use shopfront_core::{SessionId, TokenKind, UserId};
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::test_support::test_state;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    fn user(exp: i64) -> SessionUser {
        SessionUser {
            id: UserId::new(1),
            name: "John".to_string(),
            email: "john@doe.com".to_string(),
            session_id: SessionId::new(1),
            token_type: TokenKind::Access,
            exp,
            iat: exp - 900,
        }
    }

    fn tokens() -> SessionTokens {
        SessionTokens {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
        }
    }

    #[test]
    fn test_login_redirect_keeps_page() {
        let response = AuthRejection::RedirectToLogin(Some("/cart?step=2".to_string())).into_response();
        assert_eq!(
            response.headers()["location"],
            "/auth/login?next=%2Fcart%3Fstep%3D2"
        );

        let response = AuthRejection::HtmxRedirect.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()["HX-Redirect"], "/auth/login");
    }

    #[tokio::test]
    async fn test_current_user_fresh() {
        let session = session();
        let state = test_state();
        let fresh = user(Utc::now().timestamp() + 600);
        set_current_user(&session, &fresh, &tokens()).await.unwrap();

        assert_eq!(current_user(&session, &state).await, Some(fresh));
    }

    #[tokio::test]
    async fn test_current_user_anonymous() {
        assert_eq!(current_user(&session(), &test_state()).await, None);
    }

    #[tokio::test]
    async fn test_expired_user_is_signed_out_when_refresh_fails() {
        // test_state points the accounts client at a closed port
        let session = session();
        let state = test_state();
        set_current_user(&session, &user(Utc::now().timestamp() - 1), &tokens())
            .await
            .unwrap();
        session
            .insert(session_keys::SHIPPING_FORM, serde_json::json!({"name": "x"}))
            .await
            .unwrap();

        assert_eq!(current_user(&session, &state).await, None);
        assert!(
            session
                .get::<SessionTokens>(session_keys::TOKENS)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            session
                .get::<serde_json::Value>(session_keys::SHIPPING_FORM)
                .await
                .unwrap()
                .is_none()
        );

        let flashes = flash::take(&session).await;
        assert_eq!(flashes.len(), 1);
        assert_eq!(flashes[0].message, SESSION_EXPIRED_MESSAGE);
    }
}
