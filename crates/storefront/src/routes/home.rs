//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tower_sessions::Session;
use tracing::instrument;

use crate::filters;
use crate::middleware::{CspNonce, OptionalAuth};
use crate::routes::layout::Layout;
use crate::routes::products::ProductView;
use crate::state::AppState;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub products: Vec<ProductView>,
}

/// Display the product listing.
#[instrument(skip(state, session, nonce, user))]
pub async fn home(
    State(state): State<AppState>,
    session: Session,
    CspNonce(nonce): CspNonce,
    OptionalAuth(user): OptionalAuth,
) -> impl IntoResponse {
    let products = state
        .catalog()
        .products()
        .iter()
        .map(ProductView::from)
        .collect();

    HomeTemplate {
        layout: Layout::load(&session, nonce, user).await,
        products,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    use crate::test_support::{body_text, test_app};

    #[tokio::test]
    async fn test_home_lists_products() {
        let response = test_app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("Adidas CoreFit T-Shirt"));
        assert!(body.contains("Puma Ultra Warm Zip"));
        assert!(body.contains(r#"action="/cart/add""#));
    }
}
