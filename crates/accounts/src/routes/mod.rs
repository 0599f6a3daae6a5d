//! HTTP route handlers for the accounts API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health        - Liveness check
//! GET  /health/ready  - Readiness check (account store)
//!
//! # Catalog (rate limited, cached 10 minutes)
//! GET  /products      - Every product as JSON, with `X-Cache: HIT|MISS`
//!
//! # Credentials (rate limited)
//! POST /register      - Create an account, open a session, issue tokens
//! POST /login         - Open a session, issue tokens
//!
//! # Tokens
//! POST /refresh       - Rotate the token pair
//! POST /logout        - End the session (access token required)
//! GET  /me            - Identity behind the access token
//! ```

pub mod auth;
pub mod health;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the credential routes router.
pub fn credential_routes(rate_limit: bool) -> Router<AppState> {
    let router = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    if rate_limit {
        router.layer(auth_rate_limiter())
    } else {
        router
    }
}

/// Create the public catalog routes router.
pub fn catalog_routes(rate_limit: bool) -> Router<AppState> {
    let router = Router::new().route("/products", get(products::list));

    if rate_limit {
        router.layer(api_rate_limiter())
    } else {
        router
    }
}

/// Create all routes for the accounts API.
pub fn routes(rate_limit: bool) -> Router<AppState> {
    Router::new()
        .merge(credential_routes(rate_limit))
        .merge(catalog_routes(rate_limit))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
}
