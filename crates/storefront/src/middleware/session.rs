//! Session middleware configuration.
//!
//! Sessions hold the cart, the shipping form, the signed-in user and their
//! tokens, and pending toasts. They are backed by `PostgreSQL` when a database
//! is configured and by an in-process store otherwise.

use tower_sessions::{Expiry, SessionManagerLayer, SessionStore, cookie::SameSite};

use crate::config::StorefrontConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "shopfront_session";

/// Session expiry time in seconds (7 days), matching the refresh token.
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Create the session layer over any tower-sessions store.
///
/// The cookie is `HttpOnly`, `SameSite=Lax`, and `Secure` when the storefront
/// is served over HTTPS. Inactive sessions expire after seven days.
#[must_use]
pub fn create_session_layer<S: SessionStore + Clone>(
    store: S,
    config: &StorefrontConfig,
) -> SessionManagerLayer<S> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}
