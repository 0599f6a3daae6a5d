//! Types the storefront keeps in the visitor's session.

pub mod checkout;
pub mod session;

pub use checkout::{clear_checkout, load_cart, load_shipping, save_cart, save_shipping};
pub use session::{SessionTokens, session_keys};
