//! Register, login, refresh, logout and `/me`.
//!
//! Register, login and refresh answer with the token pair in the body and as
//! cookies, so both API clients and browsers can use them.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use shopfront_core::{AuthTokens, LoginForm, RegisterForm, SessionUser, TokenKind};

use crate::cookies;
use crate::error::Result;
use crate::middleware::{ClientInfo, RequireAuth, presented_token, refresh_cookie};
use crate::services::AuthError;
use crate::state::AppState;

/// Message returned by a successful logout.
pub const LOGOUT_MESSAGE: &str = "Logged out successfully";

/// `POST /register` body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(flatten)]
    pub form: RegisterForm,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// `POST /login` body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(flatten)]
    pub form: LoginForm,
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Create an account and sign it in.
#[instrument(skip_all, fields(ip = %client.ip_address))]
pub async fn register(
    State(state): State<AppState>,
    client: ClientInfo,
    body: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, CookieJar, Json<AuthTokens>)> {
    let Json(request) = body?;
    let device = client.new_session(request.device_id, Utc::now());

    let pair = state.auth().register(&request.form, device).await?;
    let jar = cookies::set_tokens(
        CookieJar::new(),
        &pair.access_token,
        &pair.refresh_token,
        state.config().secure_cookies,
    );

    Ok((StatusCode::CREATED, jar, Json(pair.to_auth_tokens())))
}

/// Sign in with email and password. Every login opens a new device session.
#[instrument(skip_all, fields(ip = %client.ip_address))]
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<AuthTokens>)> {
    let Json(request) = body?;
    let device = client.new_session(request.device_id, Utc::now());

    let pair = state
        .auth()
        .login(&request.form.email, &request.form.password, device)
        .await?;
    let jar = cookies::set_tokens(
        CookieJar::new(),
        &pair.access_token,
        &pair.refresh_token,
        state.config().secure_cookies,
    );

    Ok((jar, Json(pair.to_auth_tokens())))
}

/// Rotate the token pair. The old refresh token stops working.
#[instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<(CookieJar, Json<AuthTokens>)> {
    let token = presented_token(&headers, TokenKind::Refresh)
        .ok_or(AuthError::MissingToken(TokenKind::Refresh))?;

    let pair = state.auth().refresh(&token).await?;
    let jar = cookies::set_tokens(
        CookieJar::new(),
        &pair.access_token,
        &pair.refresh_token,
        state.config().secure_cookies,
    );

    Ok((jar, Json(pair.to_auth_tokens())))
}

/// End the current session and clear the token cookies.
#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn logout(
    State(state): State<AppState>,
    RequireAuth(auth): RequireAuth,
    headers: HeaderMap,
) -> Result<(CookieJar, Json<MessageResponse>)> {
    let refresh_token = refresh_cookie(&headers);
    state.auth().logout(&auth, refresh_token.as_deref()).await?;

    let jar = cookies::clear_tokens(CookieJar::new(), state.config().secure_cookies);
    Ok((
        jar,
        Json(MessageResponse {
            message: LOGOUT_MESSAGE,
        }),
    ))
}

/// The signed-in identity behind the access token.
#[instrument(skip_all, fields(user_id = %auth.user.id))]
pub async fn me(RequireAuth(auth): RequireAuth) -> Json<SessionUser> {
    Json(auth.session_user())
}
