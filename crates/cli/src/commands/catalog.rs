//! Product catalog checks.
//!
//! ```bash
//! shopfront catalog check crates/storefront/content/products.json
//! ```
//!
//! Loads the catalog the way the storefront does at startup, then checks
//! that every product image exists under the static directory.

use std::path::{Path, PathBuf};

use thiserror::Error;

use shopfront_storefront::catalog::{Catalog, CatalogError};

#[derive(Debug, Error)]
pub enum CatalogCheckError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("{0} product image(s) missing")]
    MissingImages(usize),
}

/// Map an image URL under `/static/` to a file under `static_dir`.
fn image_file(static_dir: &Path, url: &str) -> Option<PathBuf> {
    url.strip_prefix("/static/").map(|rel| static_dir.join(rel))
}

/// Validate the catalog at `path` and its images under `static_dir`.
///
/// # Errors
///
/// Returns `CatalogCheckError` if the catalog does not load or an image is missing.
pub fn check(path: &Path, static_dir: &Path) -> Result<(), CatalogCheckError> {
    let catalog = Catalog::load(path)?;
    tracing::info!(products = catalog.len(), "Catalog loaded from {}", path.display());

    let mut missing = 0;
    for product in catalog.products() {
        for (color, url) in &product.images {
            match image_file(static_dir, url) {
                Some(file) if file.is_file() => {}
                Some(file) => {
                    tracing::error!(product = %product.id, %color, "Image not found: {}", file.display());
                    missing += 1;
                }
                None => {
                    tracing::error!(product = %product.id, %color, "Image is not under /static/: {url}");
                    missing += 1;
                }
            }
        }
        tracing::info!(
            product = %product.id,
            price = %product.price,
            sizes = product.sizes.len(),
            colors = product.colors.len(),
            "{}",
            product.name
        );
    }

    if missing > 0 {
        return Err(CatalogCheckError::MissingImages(missing));
    }

    tracing::info!("Catalog OK");
    Ok(())
}
