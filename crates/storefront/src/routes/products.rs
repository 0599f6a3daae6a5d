//! Product route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use shopfront_core::{Money, Product, ProductId};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{CspNonce, OptionalAuth};
use crate::routes::layout::Layout;
use crate::state::AppState;

/// A colour choice and the image shown for it.
#[derive(Clone)]
pub struct ColorOption {
    pub name: String,
    pub image: String,
}

/// Product display data for templates.
#[derive(Clone)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub short_description: String,
    pub description: String,
    pub price: Money,
    pub image: String,
    pub sizes: Vec<String>,
    pub colors: Vec<ColorOption>,
}

impl From<&Product> for ProductView {
    fn from(product: &Product) -> Self {
        let colors = product
            .colors
            .iter()
            .map(|color| ColorOption {
                name: color.clone(),
                image: product.image_for(color).unwrap_or_default().to_string(),
            })
            .collect::<Vec<_>>();

        Self {
            id: product.id,
            name: product.name.clone(),
            short_description: product.short_description.clone(),
            description: product.description.clone(),
            price: product.price,
            image: colors.first().map(|c| c.image.clone()).unwrap_or_default(),
            sizes: product.sizes.clone(),
            colors,
        }
    }
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub layout: Layout,
    pub product: ProductView,
}

/// Display product detail page.
#[instrument(skip(state, session, nonce, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    CspNonce(nonce): CspNonce,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<ProductId>,
) -> Result<impl IntoResponse> {
    let product = state
        .catalog()
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    Ok(ProductShowTemplate {
        layout: Layout::load(&session, nonce, user).await,
        product: ProductView::from(product),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::catalog::tests::sample_catalog;
    use crate::test_support::{body_text, test_app};

    #[test]
    fn test_view_uses_first_color_image() {
        let catalog = sample_catalog();
        let view = ProductView::from(catalog.get(ProductId::new(1)).unwrap());
        assert_eq!(view.image, "/static/img/products/1g.svg");
        assert_eq!(view.colors.len(), 2);
        assert_eq!(view.colors[1].image, "/static/img/products/1p.svg");
    }

    #[tokio::test]
    async fn test_show_renders_product() {
        let response = test_app()
            .oneshot(Request::get("/products/1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Adidas CoreFit T-Shirt"));
        assert!(body.contains("$39.90"));
    }

    #[tokio::test]
    async fn test_show_unknown_product() {
        let response = test_app()
            .oneshot(Request::get("/products/99").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
