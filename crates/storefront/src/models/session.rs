//! Session-related types.
//!
//! Everything the storefront remembers about a visitor lives in their
//! tower-sessions session under one of the [`session_keys`].

use core::fmt;

use serde::{Deserialize, Serialize};

/// Token pair issued by the accounts API.
///
/// Stored server-side in the session; never rendered or logged.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// Session keys.
pub mod session_keys {
    /// Cart lines (JSON array of camelCase items).
    pub const CART: &str = "cart";

    /// Validated shipping form; gates the payment step.
    pub const SHIPPING_FORM: &str = "shipping_form";

    /// The `SessionUser` returned by the accounts API's `/me`.
    pub const CURRENT_USER: &str = "current_user";

    /// Access and refresh tokens.
    pub const TOKENS: &str = "auth_tokens";

    /// Pending toast notifications.
    pub const FLASHES: &str = "flashes";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_debug_redacts() {
        let tokens = SessionTokens {
            access_token: "abc123".to_string(),
            refresh_token: "def456".to_string(),
        };
        let debug = format!("{tokens:?}");
        assert!(!debug.contains("abc123"));
        assert!(!debug.contains("def456"));
    }
}
