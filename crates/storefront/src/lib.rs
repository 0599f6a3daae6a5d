//! Shopfront storefront library.
//!
//! Server-rendered storefront: product pages, a session-backed cart, the
//! three-step checkout and the login/register forms that talk to the
//! accounts API. The binary in `main.rs` wires configuration, Sentry and the
//! session store around [`app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod flash;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, body::Body, http::Request};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions::SessionStore;

use crate::middleware::{
    create_session_layer, csp_nonce_middleware, request_id_middleware,
    security_headers_middleware,
};
use crate::state::AppState;

/// Static assets, relative to the workspace root.
pub const STATIC_DIR: &str = "crates/storefront/static";

/// Build the storefront router over any session store.
///
/// Sentry layers are added by the binary so tests run without a client.
pub fn app<S>(state: AppState, store: S) -> Router
where
    S: SessionStore + Clone,
{
    let session_layer = create_session_layer(store, state.config());

    Router::new()
        .merge(routes::routes(state.config().rate_limit))
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .layer(session_layer)
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(axum::middleware::from_fn(csp_nonce_middleware))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::sync::Arc;

    use axum::{Router, body::to_bytes, http::header, response::Response};
    use chrono::Utc;
    use shopfront_core::{SessionId, SessionUser, TokenKind, UserId};
    use tower_sessions::{MemoryStore, Session};

    use crate::catalog::tests::sample_catalog;
    use crate::config::StorefrontConfig;
    use crate::middleware::{self, session::SESSION_COOKIE_NAME};
    use crate::models::SessionTokens;
    use crate::services::AccountsClient;
    use crate::state::AppState;

    /// Config whose accounts API is a closed local port.
    pub(crate) fn test_config() -> StorefrontConfig {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("STOREFRONT_BASE_URL", "http://localhost:3000"),
            ("ACCOUNTS_API_URL", "http://127.0.0.1:9"),
            ("STOREFRONT_RATE_LIMIT", "false"),
        ]);
        StorefrontConfig::from_lookup(|key| vars.get(key).map(|v| (*v).to_string())).unwrap()
    }

    pub(crate) fn test_state() -> AppState {
        let config = test_config();
        let accounts = AccountsClient::new(&config.accounts_api_url).unwrap();
        AppState::new(config, sample_catalog(), accounts, None)
    }

    pub(crate) fn test_app() -> Router {
        test_app_with_store(MemoryStore::default())
    }

    pub(crate) fn test_app_with_store(store: MemoryStore) -> Router {
        crate::app(test_state(), store)
    }

    pub(crate) async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// `name=value` of the session cookie set by a response.
    pub(crate) fn session_cookie(response: &Response) -> Option<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(SESSION_COOKIE_NAME))
            .and_then(|v| v.split(';').next())
            .map(String::from)
    }

    /// Store a session with a fresh signed-in user and return its cookie.
    pub(crate) async fn signed_in_cookie(store: &MemoryStore) -> String {
        let session = Session::new(None, Arc::new(store.clone()), None);
        let now = Utc::now().timestamp();
        let user = SessionUser {
            id: UserId::new(1),
            name: "John Doe".to_string(),
            email: "john@doe.com".to_string(),
            session_id: SessionId::new(1),
            token_type: TokenKind::Access,
            exp: now + 900,
            iat: now,
        };
        let tokens = SessionTokens {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
        };
        middleware::set_current_user(&session, &user, &tokens)
            .await
            .unwrap();
        session.save().await.unwrap();

        format!("{SESSION_COOKIE_NAME}={}", session.id().unwrap())
    }
}
