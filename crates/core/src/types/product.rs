//! Catalog products.
//!
//! Products are read-only. The storefront loads them once from a JSON file
//! and every cart line carries a snapshot of the product it was added from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::money::Money;

crate::define_id!(ProductId);

/// Problems found when checking a catalog entry.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductError {
    #[error("product {0} has an empty name")]
    EmptyName(ProductId),
    #[error("product {0} has a non-positive price")]
    NonPositivePrice(ProductId),
    #[error("product {0} has no sizes")]
    NoSizes(ProductId),
    #[error("product {0} has no colors")]
    NoColors(ProductId),
    #[error("product {id} has no image for color {color}")]
    MissingImage { id: ProductId, color: String },
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub short_description: String,
    pub description: String,
    pub price: Money,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    /// Image URL per color.
    pub images: BTreeMap<String, String>,
}

impl Product {
    /// Whether `size` is one of the offered sizes.
    #[must_use]
    pub fn has_size(&self, size: &str) -> bool {
        self.sizes.iter().any(|s| s == size)
    }

    /// Whether `color` is one of the offered colors.
    #[must_use]
    pub fn has_color(&self, color: &str) -> bool {
        self.colors.iter().any(|c| c == color)
    }

    /// Image for the given color, falling back to the first color's image.
    #[must_use]
    pub fn image_for(&self, color: &str) -> Option<&str> {
        self.images
            .get(color)
            .or_else(|| self.colors.first().and_then(|c| self.images.get(c)))
            .map(String::as_str)
    }

    /// Check the entry is usable in the shop.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ProductError> {
        if self.name.trim().is_empty() {
            return Err(ProductError::EmptyName(self.id));
        }
        if !self.price.amount().is_sign_positive() || self.price.is_zero() {
            return Err(ProductError::NonPositivePrice(self.id));
        }
        if self.sizes.is_empty() {
            return Err(ProductError::NoSizes(self.id));
        }
        if self.colors.is_empty() {
            return Err(ProductError::NoColors(self.id));
        }
        if let Some(color) = self.colors.iter().find(|c| !self.images.contains_key(*c)) {
            return Err(ProductError::MissingImage {
                id: self.id,
                color: color.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_product() -> Product {
        Product {
            id: ProductId::new(1),
            name: "Adidas CoreFit T-Shirt".to_string(),
            short_description: "Soft cotton tee".to_string(),
            description: "A soft cotton tee for every day.".to_string(),
            price: Money::from_cents(3990),
            sizes: vec!["s".to_string(), "m".to_string(), "l".to_string()],
            colors: vec!["gray".to_string(), "purple".to_string()],
            images: BTreeMap::from([
                ("gray".to_string(), "/static/img/1g.png".to_string()),
                ("purple".to_string(), "/static/img/1p.png".to_string()),
            ]),
        }
    }

    #[test]
    fn test_options() {
        let product = sample_product();
        assert!(product.has_size("m"));
        assert!(!product.has_size("xl"));
        assert!(product.has_color("purple"));
        assert!(!product.has_color("red"));
    }

    #[test]
    fn test_image_fallback() {
        let product = sample_product();
        assert_eq!(product.image_for("purple"), Some("/static/img/1p.png"));
        assert_eq!(product.image_for("red"), Some("/static/img/1g.png"));
    }

    #[test]
    fn test_validate() {
        let mut product = sample_product();
        assert!(product.validate().is_ok());

        product.images.remove("purple");
        assert_eq!(
            product.validate(),
            Err(ProductError::MissingImage {
                id: ProductId::new(1),
                color: "purple".to_string()
            })
        );

        product.price = Money::ZERO;
        assert_eq!(
            product.validate(),
            Err(ProductError::NonPositivePrice(ProductId::new(1)))
        );
    }

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{
            "id": 2,
            "name": "Puma Ultra Warm Zip",
            "shortDescription": "Warm zip",
            "description": "A warm zip jacket.",
            "price": "59.90",
            "sizes": ["m"],
            "colors": ["gray"],
            "images": {"gray": "/static/img/2g.png"}
        }"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.id, ProductId::new(2));
        assert_eq!(product.price, Money::from_cents(5990));
        assert!(product.validate().is_ok());
    }
}
