//! Read-only product catalog.
//!
//! Loaded once at startup from a JSON array of products. Every entry is
//! validated and ids must be unique; a bad catalog stops the server from
//! starting rather than surfacing as broken product pages.

use std::collections::HashMap;
use std::path::Path;

use shopfront_core::{Product, ProductError, ProductId};
use thiserror::Error;

/// Errors loading the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid product: {0}")]
    Invalid(#[from] ProductError),

    #[error("duplicate product id {0}")]
    DuplicateId(ProductId),
}

/// The product catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
    index: HashMap<ProductId, usize>,
}

impl Catalog {
    /// Load the catalog from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Parse and validate a catalog from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the JSON is malformed, an entry is invalid or
    /// two entries share an id.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let products: Vec<Product> = serde_json::from_str(raw)?;
        Self::from_products(products)
    }

    /// Build a catalog from products.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if an entry is invalid or two share an id.
    pub fn from_products(products: Vec<Product>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(products.len());
        for (position, product) in products.iter().enumerate() {
            product.validate()?;
            if index.insert(product.id, position).is_some() {
                return Err(CatalogError::DuplicateId(product.id));
            }
        }
        Ok(Self { products, index })
    }

    /// All products in catalog order.
    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Look up a product by id.
    #[must_use]
    pub fn get(&self, id: ProductId) -> Option<&Product> {
        self.index.get(&id).and_then(|&i| self.products.get(i))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
