//! Shopfront accounts library.
//!
//! JSON API behind the storefront's login and registration forms: password
//! accounts, one session per signed-in device, and opaque access/refresh
//! tokens delivered both in the response body and as cookies. The binary in
//! `main.rs` wires configuration, Sentry and the account store around [`app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod cookies;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod tokens;

use axum::{
    Router,
    body::Body,
    http::{
        Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// CORS for the storefront origin, with cookies.
fn cors_layer(state: &AppState) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(state.config().allowed_origin.clone())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
}

/// Build the accounts API router.
///
/// Sentry layers are added by the binary so tests run without a client.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::routes(state.config().rate_limit))
        .layer(cors_layer(&state))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri().path(),
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

    use axum::{Router, body::to_bytes, response::Response};

    use crate::config::AccountsConfig;
    use crate::state::AppState;
    use crate::store::MemoryAccountStore;

    pub(crate) fn catalog_path() -> String {
        format!("{}/../storefront/content/products.json", env!("CARGO_MANIFEST_DIR"))
    }

    pub(crate) fn test_config() -> AccountsConfig {
        let catalog = catalog_path();
        let vars: HashMap<&str, &str> = HashMap::from([
            ("ACCOUNTS_RATE_LIMIT", "false"),
            ("ACCOUNTS_CATALOG_PATH", catalog.as_str()),
        ]);
        AccountsConfig::from_lookup(|key| vars.get(key).map(|v| (*v).to_string())).unwrap()
    }

    pub(crate) fn test_state() -> AppState {
        AppState::new(test_config(), Arc::new(MemoryAccountStore::new()))
    }

    pub(crate) fn test_app() -> Router {
        crate::app(test_state())
    }

    pub(crate) async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{StatusCode, header};
    use tower::ServiceExt;

    use super::*;
    use crate::test_support::test_app;

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = test_app()
            .oneshot(
                Request::builder()
                    .uri("/health/ready")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_storefront_with_credentials() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/login")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[tokio::test]
    async fn test_cors_rejects_other_origins() {
        let response = test_app()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/login")
                    .header(header::ORIGIN, "https://evil.example.com")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }
}
