//! Cart and shipping form persistence.
//!
//! The cart is rehydrated from the session at the start of every request that
//! needs it and written back after each mutation. Read failures degrade to an
//! empty cart; an unreadable stored value is dropped so it cannot fail again.

use shopfront_core::{Cart, ShippingForm};
use tower_sessions::Session;

use super::session_keys;

/// Rehydrate the visitor's cart.
pub async fn load_cart(session: &Session) -> Cart {
    let stored = match session.get::<serde_json::Value>(session_keys::CART).await {
        Ok(stored) => stored,
        Err(e) => {
            tracing::warn!("Failed to read cart from session: {e}");
            return Cart::new();
        }
    };

    let Some(value) = stored else {
        return Cart::new();
    };

    match Cart::from_json(value) {
        Ok(cart) => cart,
        Err(e) => {
            tracing::warn!("Stored cart is unreadable, resetting: {e}");
            if let Err(e) = session.remove::<serde_json::Value>(session_keys::CART).await {
                tracing::warn!("Failed to remove unreadable cart: {e}");
            }
            Cart::new()
        }
    }
}

/// Persist the cart.
///
/// # Errors
///
/// Returns an error if the session cannot be written.
pub async fn save_cart(session: &Session, cart: &Cart) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CART, cart).await
}

/// The shipping form saved at step 2, if any.
pub async fn load_shipping(session: &Session) -> Option<ShippingForm> {
    session
        .get::<ShippingForm>(session_keys::SHIPPING_FORM)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to read shipping form from session: {e}");
            None
        })
}

/// Save a validated shipping form.
///
/// # Errors
///
/// Returns an error if the session cannot be written.
pub async fn save_shipping(
    session: &Session,
    form: &ShippingForm,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::SHIPPING_FORM, form).await
}

/// Empty the cart and forget the shipping form.
///
/// # Errors
///
/// Returns an error if the session cannot be written.
pub async fn clear_checkout(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.remove::<serde_json::Value>(session_keys::CART).await?;
    session
        .remove::<serde_json::Value>(session_keys::SHIPPING_FORM)
        .await?;
    Ok(())
}
