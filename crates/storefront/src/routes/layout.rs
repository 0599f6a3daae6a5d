//! Data every full page renders in the shared layout.

use shopfront_core::{Cart, SessionUser};
use tower_sessions::Session;

use crate::flash::{self, Flash};
use crate::models::load_cart;

/// Header, toasts and script nonce for `base.html`.
pub struct Layout {
    pub nonce: String,
    pub cart_count: u32,
    pub user: Option<SessionUser>,
    pub flashes: Vec<Flash>,
}

impl Layout {
    /// Build the layout, reading the cart badge from the session.
    ///
    /// Takes the queued toasts, so call it after any `flash::push` for this
    /// response.
    pub async fn load(session: &Session, nonce: String, user: Option<SessionUser>) -> Self {
        let cart = load_cart(session).await;
        Self::with_cart(session, nonce, user, &cart).await
    }

    /// Build the layout from a cart the handler already loaded.
    pub async fn with_cart(
        session: &Session,
        nonce: String,
        user: Option<SessionUser>,
        cart: &Cart,
    ) -> Self {
        Self {
            nonce,
            cart_count: cart.item_count(),
            user,
            flashes: flash::take(session).await,
        }
    }

    /// First name shown in the user menu.
    #[must_use]
    pub fn greeting(&self) -> Option<&str> {
        self.user
            .as_ref()
            .and_then(|u| u.name.split_whitespace().next())
    }
}
