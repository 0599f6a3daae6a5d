//! The shopping cart.
//!
//! A cart is an ordered list of lines. Each line is identified by
//! `(product id, selected size, selected color)`; adding a line whose key is
//! already present bumps that line's quantity instead of appending.
//!
//! The cart is persisted as a JSON array of camelCase objects, one per line,
//! each carrying a full product snapshot plus `quantity`, `selectedSize` and
//! `selectedColor`.

use serde::{Deserialize, Serialize};

use super::money::Money;
use super::product::{Product, ProductId};

/// Errors from cart operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    /// A line was added with quantity zero.
    #[error("quantity must be at least 1")]
    ZeroQuantity,

    /// Persisted cart data is not a JSON array.
    #[error("stored cart is not a list")]
    NotAList,

    /// Persisted cart data is an array but a line could not be read.
    #[error("stored cart is malformed: {0}")]
    Malformed(String),
}

/// Identity of a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartKey {
    pub id: ProductId,
    pub size: String,
    pub color: String,
}

impl CartKey {
    #[must_use]
    pub fn new(id: ProductId, size: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id,
            size: size.into(),
            color: color.into(),
        }
    }
}

/// One line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(flatten)]
    pub product: Product,
    pub quantity: u32,
    pub selected_size: String,
    pub selected_color: String,
}

impl CartItem {
    /// Snapshot `product` into a new line.
    #[must_use]
    pub fn new(
        product: Product,
        quantity: u32,
        selected_size: impl Into<String>,
        selected_color: impl Into<String>,
    ) -> Self {
        Self {
            product,
            quantity,
            selected_size: selected_size.into(),
            selected_color: selected_color.into(),
        }
    }

    #[must_use]
    pub fn key(&self) -> CartKey {
        CartKey::new(
            self.product.id,
            self.selected_size.clone(),
            self.selected_color.clone(),
        )
    }

    fn matches(&self, key: &CartKey) -> bool {
        self.product.id == key.id
            && self.selected_size == key.size
            && self.selected_color == key.color
    }

    /// Price snapshot times quantity.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.product.price * self.quantity
    }
}

/// An ordered collection of cart lines with unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Flat discount applied to every order.
    pub const DISCOUNT_CENTS: i64 = 1000;
    /// Flat shipping fee applied to every order.
    pub const SHIPPING_FEE_CENTS: i64 = 1000;

    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from stored lines, dropping zero-quantity lines and
    /// merging lines that share a key. First appearance wins the position.
    #[must_use]
    pub fn rehydrate(items: Vec<CartItem>) -> Self {
        let mut cart = Self::new();
        for item in items {
            if item.quantity > 0 {
                cart.merge(item);
            }
        }
        cart
    }

    /// Read a persisted cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotAList`] if the value is not a JSON array and
    /// [`CartError::Malformed`] if any line cannot be read.
    pub fn from_json(value: serde_json::Value) -> Result<Self, CartError> {
        if !value.is_array() {
            return Err(CartError::NotAList);
        }
        let items: Vec<CartItem> =
            serde_json::from_value(value).map_err(|e| CartError::Malformed(e.to_string()))?;
        Ok(Self::rehydrate(items))
    }

    /// Add a line, merging with an existing line of the same key.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ZeroQuantity`] if `item.quantity` is zero.
    pub fn add(&mut self, item: CartItem) -> Result<(), CartError> {
        if item.quantity == 0 {
            return Err(CartError::ZeroQuantity);
        }
        self.merge(item);
        Ok(())
    }

    fn merge(&mut self, item: CartItem) {
        let key = item.key();
        match self.items.iter_mut().find(|line| line.matches(&key)) {
            Some(line) => line.quantity = line.quantity.saturating_add(item.quantity),
            None => self.items.push(item),
        }
    }

    /// Remove the line with `key`. Returns whether a line was removed.
    pub fn remove(&mut self, key: &CartKey) -> bool {
        let before = self.items.len();
        self.items.retain(|line| !line.matches(key));
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn into_items(self) -> Vec<CartItem> {
        self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, line| acc.saturating_add(line.quantity))
    }

    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    #[must_use]
    pub fn discount(&self) -> Money {
        Money::from_cents(Self::DISCOUNT_CENTS)
    }

    #[must_use]
    pub fn shipping_fee(&self) -> Money {
        Money::from_cents(Self::SHIPPING_FEE_CENTS)
    }

    /// Subtotal minus discount plus shipping fee.
    #[must_use]
    pub fn total(&self) -> Money {
        self.subtotal() - self.discount() + self.shipping_fee()
    }
}
