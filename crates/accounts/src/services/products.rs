//! Public product catalog.
//!
//! `GET /products` serves the same catalog file the storefront sells from.
//! Serialized responses are kept in `moka` for 10 minutes so repeated reads
//! skip the disk and the JSON round trip.

use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::body::Bytes;
use moka::future::Cache;
use thiserror::Error;
use tracing::debug;

use shopfront_core::{Product, ProductError};

/// How long a serialized catalog stays cached.
const RESPONSE_TTL: Duration = Duration::from_secs(10 * 60);

const CATALOG_KEY: &str = "products";

/// Failures reading the catalog file.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid catalog entry: {0}")]
    Invalid(#[from] ProductError),
}

/// Whether a response came out of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    /// Value for the `X-Cache` response header.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }
}

/// The catalog file and its response cache.
pub struct ProductCatalog {
    path: PathBuf,
    responses: Cache<String, Bytes>,
}

impl ProductCatalog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            responses: Cache::builder()
                .max_capacity(16)
                .time_to_live(RESPONSE_TTL)
                .build(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Catalog JSON, from the cache when it holds a fresh copy.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` on a miss if the file cannot be read or is not
    /// a valid catalog. Failures are not cached.
    pub async fn cached_json(&self) -> Result<(Bytes, CacheStatus), CatalogError> {
        if let Some(body) = self.responses.get(CATALOG_KEY).await {
            debug!("Cache hit for products");
            return Ok((body, CacheStatus::Hit));
        }

        let body = self.read_json().await?;
        self.responses
            .insert(CATALOG_KEY.to_string(), body.clone())
            .await;
        Ok((body, CacheStatus::Miss))
    }

    /// Read, validate and serialize the catalog, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the file cannot be read or an entry is
    /// invalid.
    pub async fn read_json(&self) -> Result<Bytes, CatalogError> {
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|source| CatalogError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        let products: Vec<Product> = serde_json::from_slice(&raw)?;
        for product in &products {
            product.validate()?;
        }
        Ok(Bytes::from(serde_json::to_vec(&products)?))
    }

    /// Drop the cached response so the next read goes to disk.
    pub async fn invalidate(&self) {
        self.responses.invalidate(CATALOG_KEY).await;
    }
}
