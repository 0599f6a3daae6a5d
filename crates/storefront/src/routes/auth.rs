//! Authentication route handlers.
//!
//! Login and registration validate the form locally, then call the accounts
//! API. On success the token pair is kept in the session, `/me` is called to
//! learn who signed in, and the session id is cycled.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use shopfront_core::{AuthTokens, FieldErrors, LoginForm, RegisterForm};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::flash;
use crate::middleware::{CspNonce, OptionalAuth, Visitor, clear_auth, set_current_user};
use crate::models::{SessionTokens, session_keys};
use crate::routes::layout::Layout;
use crate::services::AccountsError;
use crate::state::AppState;

pub const LOGIN_SUCCESS_MESSAGE: &str = "Login successful";
pub const LOGIN_FAILED_MESSAGE: &str = "Login failed";
pub const REGISTER_SUCCESS_MESSAGE: &str = "User registered successfully!";
pub const REGISTER_FAILED_MESSAGE: &str = "Registration failed";
pub const NETWORK_ERROR_MESSAGE: &str = "Network error occurred";
pub const LOGOUT_MESSAGE: &str = "Logged out successfully";

// =============================================================================
// Form Types
// =============================================================================

/// Login form data plus where to go afterwards.
#[derive(Debug, Deserialize)]
pub struct LoginSubmission {
    #[serde(flatten)]
    pub form: LoginForm,
    pub next: Option<String>,
}

/// Registration form data plus where to go afterwards.
#[derive(Debug, Deserialize)]
pub struct RegisterSubmission {
    #[serde(flatten)]
    pub form: RegisterForm,
    pub next: Option<String>,
}

/// Query parameters for the auth pages.
#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub form: LoginForm,
    pub errors: FieldErrors,
    pub next: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub layout: Layout,
    pub form: RegisterForm,
    pub errors: FieldErrors,
    pub next: String,
}

// =============================================================================
// Helpers
// =============================================================================

/// Only same-site paths are followed after signing in.
fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

/// Why a login or registration did not end signed in.
#[derive(Debug, thiserror::Error)]
enum SignInError {
    #[error(transparent)]
    Accounts(#[from] AccountsError),
    #[error("failed to store signed-in user: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

/// Toast text for a failed sign-in.
fn failure_message(error: &SignInError, fallback: &str) -> String {
    match error {
        SignInError::Accounts(AccountsError::Network(_)) => NETWORK_ERROR_MESSAGE.to_string(),
        SignInError::Accounts(e) => e
            .rejection_message()
            .filter(|m| !m.is_empty())
            .unwrap_or(fallback)
            .to_string(),
        SignInError::Session(_) => fallback.to_string(),
    }
}

/// Store the tokens, run `/me` and start a fresh session id.
///
/// The session id is only cycled once the user is stored.
async fn sign_in(
    state: &AppState,
    session: &Session,
    issued: AuthTokens,
) -> std::result::Result<(), SignInError> {
    let tokens = SessionTokens {
        access_token: issued.access_token,
        refresh_token: issued.refresh_token,
    };
    let user = state.accounts().me(&tokens.access_token).await?;

    set_current_user(session, &user, &tokens).await?;
    if let Err(e) = session.cycle_id().await {
        tracing::warn!("Failed to cycle session id: {e}");
    }
    add_breadcrumb("auth", "Signed in", None);
    Ok(())
}

/// Tell the accounts API the session is over.
///
/// An access token that has expired since the last page load is renewed once
/// with the refresh token so the API can still end the device session.
async fn end_remote_session(
    state: &AppState,
    tokens: &SessionTokens,
) -> std::result::Result<(), AccountsError> {
    match state
        .accounts()
        .logout(&tokens.access_token, &tokens.refresh_token)
        .await
    {
        Err(e) if e.is_unauthorized() => {
            tracing::debug!("Access token rejected at logout, refreshing once");
            let issued = state.accounts().refresh(&tokens.refresh_token).await?;
            state
                .accounts()
                .logout(&issued.access_token, &issued.refresh_token)
                .await
        }
        other => other,
    }
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
#[instrument(skip(session, nonce, user))]
pub async fn login_page(
    session: Session,
    CspNonce(nonce): CspNonce,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<NextQuery>,
) -> Response {
    let next = safe_next(query.next.as_deref());
    if user.is_some() {
        return Redirect::to(&next).into_response();
    }

    LoginTemplate {
        layout: Layout::load(&session, nonce, None).await,
        form: LoginForm::default(),
        errors: FieldErrors::new(),
        next,
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip(state, session, nonce, visitor, submission))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    CspNonce(nonce): CspNonce,
    visitor: Visitor,
    Form(submission): Form<LoginSubmission>,
) -> Response {
    let next = safe_next(submission.next.as_deref());
    let mut form = submission.form;

    let status = match form.validate() {
        Err(errors) => {
            form.password.clear();
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                LoginTemplate {
                    layout: Layout::load(&session, nonce, None).await,
                    form,
                    errors,
                    next,
                },
            )
                .into_response();
        }
        Ok(()) => match state.accounts().login(&form, &visitor).await {
            Ok(issued) => sign_in(&state, &session, issued).await,
            Err(e) => Err(e.into()),
        },
    };

    match status {
        Ok(()) => {
            flash::success(&session, LOGIN_SUCCESS_MESSAGE).await;
            Redirect::to(&next).into_response()
        }
        Err(e) => {
            tracing::warn!("Login failed: {e}");
            flash::error(&session, failure_message(&e, LOGIN_FAILED_MESSAGE)).await;
            form.password.clear();
            LoginTemplate {
                layout: Layout::load(&session, nonce, None).await,
                form,
                errors: FieldErrors::new(),
                next,
            }
            .into_response()
        }
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
#[instrument(skip(session, nonce, user))]
pub async fn register_page(
    session: Session,
    CspNonce(nonce): CspNonce,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<NextQuery>,
) -> Response {
    let next = safe_next(query.next.as_deref());
    if user.is_some() {
        return Redirect::to(&next).into_response();
    }

    RegisterTemplate {
        layout: Layout::load(&session, nonce, None).await,
        form: RegisterForm::default(),
        errors: FieldErrors::new(),
        next,
    }
    .into_response()
}

/// Handle registration form submission.
#[instrument(skip(state, session, nonce, visitor, submission))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    CspNonce(nonce): CspNonce,
    visitor: Visitor,
    Form(submission): Form<RegisterSubmission>,
) -> Response {
    let next = safe_next(submission.next.as_deref());
    let mut form = submission.form;

    if let Err(errors) = form.validate() {
        form.password.clear();
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            RegisterTemplate {
                layout: Layout::load(&session, nonce, None).await,
                form,
                errors,
                next,
            },
        )
            .into_response();
    }

    let status = match state.accounts().register(&form, &visitor).await {
        Ok(issued) => sign_in(&state, &session, issued).await,
        Err(e) => Err(e.into()),
    };

    match status {
        Ok(()) => {
            flash::success(&session, REGISTER_SUCCESS_MESSAGE).await;
            Redirect::to(&next).into_response()
        }
        Err(e) => {
            tracing::warn!("Registration failed: {e}");
            flash::error(&session, failure_message(&e, REGISTER_FAILED_MESSAGE)).await;
            form.password.clear();
            RegisterTemplate {
                layout: Layout::load(&session, nonce, None).await,
                form,
                errors: FieldErrors::new(),
                next,
            }
            .into_response()
        }
    }
}

// =============================================================================
// Logout Route
// =============================================================================

/// Handle logout.
///
/// Tells the accounts API first; whatever it answers, the local sign-in state
/// and shipping form are cleared and the session id is cycled.
#[instrument(skip(state, session))]
pub async fn logout(State(state): State<AppState>, session: Session) -> Result<Redirect> {
    let tokens = session
        .get::<SessionTokens>(session_keys::TOKENS)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to read tokens during logout: {e}");
            None
        });

    if let Some(tokens) = tokens
        && let Err(e) = end_remote_session(&state, &tokens).await
    {
        tracing::warn!("Accounts API logout failed: {e}");
    }

    clear_auth(&session).await?;
    session.cycle_id().await?;
    add_breadcrumb("auth", "Signed out", None);
    flash::success(&session, LOGOUT_MESSAGE).await;

    Ok(Redirect::to("/"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, header},
    };
    use tower::ServiceExt;
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::test_support::{body_text, signed_in_cookie, test_app, test_app_with_store};

    fn form_post(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::post(uri).header(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/cart?step=2")), "/cart?step=2");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(Some("/\\evil.example")), "/");
        assert_eq!(safe_next(None), "/");
    }

    #[test]
    fn test_failure_message() {
        let rejected = AccountsError::Rejected {
            status: reqwest::StatusCode::UNAUTHORIZED,
            message: "Invalid email or password".to_string(),
        };
        assert_eq!(
            failure_message(&rejected.into(), LOGIN_FAILED_MESSAGE),
            "Invalid email or password"
        );

        let blank = AccountsError::Rejected {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            message: String::new(),
        };
        assert_eq!(failure_message(&blank.into(), LOGIN_FAILED_MESSAGE), "Login failed");
        assert_eq!(
            failure_message(&AccountsError::InvalidToken.into(), REGISTER_FAILED_MESSAGE),
            "Registration failed"
        );

        let session = SignInError::Session(tower_sessions::session::Error::Store(
            tower_sessions::session_store::Error::Backend("down".to_string()),
        ));
        assert_eq!(failure_message(&session, LOGIN_FAILED_MESSAGE), "Login failed");
    }

    #[tokio::test]
    async fn test_login_page_renders() {
        let response = test_app()
            .oneshot(Request::get("/auth/login").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains(r#"name="password""#));
    }

    #[tokio::test]
    async fn test_login_validation_errors() {
        let response = test_app()
            .oneshot(form_post("/auth/login", None, "email=nope&password=123"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_text(response).await;
        assert!(body.contains("Email is invalid"));
        assert!(body.contains("Password must be at least 6 characters long"));
    }

    #[tokio::test]
    async fn test_register_validation_errors() {
        let response = test_app()
            .oneshot(form_post(
                "/auth/register",
                None,
                "name=J&email=john%40doe.com&password=secret123",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_text(response).await;
        assert!(body.contains("Name must be at least 2 characters long"));
        assert!(!body.contains("secret123"));
    }

    #[tokio::test]
    async fn test_login_network_error_toast() {
        // test_state points the accounts client at a closed port
        let response = test_app()
            .oneshot(form_post(
                "/auth/login",
                None,
                "email=john%40doe.com&password=secret123",
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains(NETWORK_ERROR_MESSAGE));
    }

    #[tokio::test]
    async fn test_logout_clears_user_even_when_api_unreachable() {
        let store = MemoryStore::default();
        let cookie = signed_in_cookie(&store).await;
        let app = test_app_with_store(store);

        let response = app
            .clone()
            .oneshot(form_post("/auth/logout", Some(&cookie), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");

        // The old session id no longer carries a user
        let page = app
            .oneshot(
                Request::get("/cart")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(body_text(page).await.contains("Authentication Required"));
    }

    #[tokio::test]
    async fn test_signed_in_visitor_skips_login_page() {
        let store = MemoryStore::default();
        let cookie = signed_in_cookie(&store).await;
        let response = test_app_with_store(store)
            .oneshot(
                Request::get("/auth/login?next=/cart")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[header::LOCATION], "/cart");
    }
}
