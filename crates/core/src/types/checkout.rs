//! Checkout wizard steps.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A step of the three-step checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum CheckoutStep {
    #[default]
    Cart = 1,
    Shipping = 2,
    Payment = 3,
}

impl CheckoutStep {
    /// All steps in order.
    pub const ALL: [Self; 3] = [Self::Cart, Self::Shipping, Self::Payment];

    /// Resolve the `step` query parameter.
    ///
    /// Anything other than `1`, `2` or `3` (including a missing parameter)
    /// lands on the cart step.
    #[must_use]
    pub fn from_query(step: Option<&str>) -> Self {
        step.and_then(|s| s.trim().parse::<u8>().ok())
            .and_then(|n| Self::try_from(n).ok())
            .unwrap_or_default()
    }

    #[must_use]
    pub const fn number(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Cart => "Shopping Cart",
            Self::Shipping => "Shipping Address",
            Self::Payment => "Payment Method",
        }
    }

    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Cart => Some(Self::Shipping),
            Self::Shipping => Some(Self::Payment),
            Self::Payment => None,
        }
    }

    /// URL of this step's page.
    #[must_use]
    pub fn href(self) -> String {
        format!("/cart?step={}", self.number())
    }

    /// Whether this step is the one shown or one already passed.
    #[must_use]
    pub fn is_reached_by(self, current: Self) -> bool {
        self.number() <= current.number()
    }
}

impl fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl From<CheckoutStep> for u8 {
    fn from(step: CheckoutStep) -> Self {
        step.number()
    }
}

impl TryFrom<u8> for CheckoutStep {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Cart),
            2 => Ok(Self::Shipping),
            3 => Ok(Self::Payment),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_query() {
        assert_eq!(CheckoutStep::from_query(None), CheckoutStep::Cart);
        assert_eq!(CheckoutStep::from_query(Some("1")), CheckoutStep::Cart);
        assert_eq!(CheckoutStep::from_query(Some("2")), CheckoutStep::Shipping);
        assert_eq!(CheckoutStep::from_query(Some("3")), CheckoutStep::Payment);
    }

    #[test]
    fn test_from_query_invalid_falls_back_to_cart() {
        for raw in ["0", "4", "-1", "abc", "", "2.5", "999"] {
            assert_eq!(CheckoutStep::from_query(Some(raw)), CheckoutStep::Cart, "{raw}");
        }
    }

    #[test]
    fn test_titles_and_sequence() {
        assert_eq!(CheckoutStep::Cart.title(), "Shopping Cart");
        assert_eq!(CheckoutStep::Shipping.title(), "Shipping Address");
        assert_eq!(CheckoutStep::Payment.title(), "Payment Method");
        assert_eq!(CheckoutStep::Cart.next(), Some(CheckoutStep::Shipping));
        assert_eq!(CheckoutStep::Payment.next(), None);
        assert_eq!(CheckoutStep::Shipping.href(), "/cart?step=2");
    }

    #[test]
    fn test_is_reached_by() {
        assert!(CheckoutStep::Cart.is_reached_by(CheckoutStep::Shipping));
        assert!(CheckoutStep::Shipping.is_reached_by(CheckoutStep::Shipping));
        assert!(!CheckoutStep::Payment.is_reached_by(CheckoutStep::Shipping));
    }
}
