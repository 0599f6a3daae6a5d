//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Product listing
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (session database)
//!
//! # Products
//! GET  /products/{id}          - Product detail
//!
//! # Cart (HTMX fragments)
//! GET  /cart?step=N            - Checkout wizard (1 cart, 2 shipping, 3 payment)
//! POST /cart/add               - Add to cart (count fragment + cart-updated, or redirect)
//! POST /cart/remove            - Remove line (items fragment, or redirect)
//! POST /cart/clear             - Empty the cart and forget the shipping form
//! GET  /cart/count             - Cart count badge (fragment)
//!
//! # Checkout (requires auth)
//! POST /cart/continue          - Step 1 to 2
//! POST /cart/shipping          - Save shipping form, go to step 3
//! POST /cart/payment           - Validate payment form
//!
//! # Auth (rate limited)
//! GET  /auth/login             - Login page
//! POST /auth/login             - Login action
//! GET  /auth/register          - Register page
//! POST /auth/register          - Register action
//! POST /auth/logout            - Logout action
//! ```

pub mod auth;
pub mod cart;
pub mod health;
pub mod home;
pub mod layout;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes(rate_limit: bool) -> Router<AppState> {
    let router = Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout));

    if rate_limit {
        router.layer(auth_rate_limiter())
    } else {
        router
    }
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new().route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/count", get(cart::count))
        .route("/continue", post(cart::proceed))
        .route("/shipping", post(cart::shipping))
        .route("/payment", post(cart::payment))
}

/// Create all routes for the storefront.
pub fn routes(rate_limit: bool) -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/auth", auth_routes(rate_limit))
}
