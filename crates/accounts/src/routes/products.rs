//! Product catalog.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};

use crate::error::Result;
use crate::services::CacheStatus;
use crate::state::AppState;

/// Tells the caller whether the body came from the response cache.
pub const X_CACHE: &str = "x-cache";

/// List every product as JSON.
///
/// Anonymous reads go through the 10 minute response cache and carry
/// `X-Cache: HIT` or `MISS`. Requests with an `Authorization` header always
/// read the catalog fresh and get no `X-Cache` header.
pub async fn list(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    if headers.contains_key(header::AUTHORIZATION) {
        let body = state.products().read_json().await?;
        return Ok(json_response(body));
    }

    let (body, status) = state.products().cached_json().await?;
    if status == CacheStatus::Miss {
        tracing::debug!(path = %state.products().path().display(), "Products loaded from disk");
    }
    let mut response = json_response(body);
    response
        .headers_mut()
        .insert(X_CACHE, HeaderValue::from_static(status.as_str()));
    Ok(response)
}

fn json_response(body: Bytes) -> Response {
    let mut response = body.into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::config::AccountsConfig;
    use crate::store::MemoryAccountStore;
    use crate::test_support::{body_json, test_config};

    fn get(builder: axum::http::request::Builder) -> Request<Body> {
        builder.method("GET").uri("/products").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_products_miss_then_hit() {
        let app = crate::app(crate::test_support::test_state());

        let response = app.clone().oneshot(get(Request::builder())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[X_CACHE], "MISS");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let products = body_json(response).await;
        assert!(products.as_array().is_some_and(|p| !p.is_empty()));

        let response = app.oneshot(get(Request::builder())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[X_CACHE], "HIT");
        assert_eq!(body_json(response).await, products);
    }

    #[tokio::test]
    async fn test_products_with_authorization_skip_cache() {
        let app = crate::app(crate::test_support::test_state());
        app.clone().oneshot(get(Request::builder())).await.unwrap();

        let response = app
            .oneshot(get(
                Request::builder().header(header::AUTHORIZATION, "Bearer anything"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(X_CACHE).is_none());
    }

    #[tokio::test]
    async fn test_products_missing_catalog() {
        let config = AccountsConfig {
            catalog_path: "/nonexistent/products.json".into(),
            ..test_config()
        };
        let app: Router = crate::app(crate::state::AppState::new(
            config,
            Arc::new(MemoryAccountStore::new()),
        ));

        let response = app.oneshot(get(Request::builder())).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Products not found");
    }
}
