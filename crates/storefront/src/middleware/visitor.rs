//! The shopper behind a request, as forwarded to the accounts API.
//!
//! The storefront calls the accounts API server-to-server, so without these
//! details every session would record the storefront's own address and
//! user agent, and every shopper would share one rate limit bucket there.

use std::convert::Infallible;
use std::net::IpAddr;

use axum::extract::FromRequestParts;
use axum::http::{header::USER_AGENT, request::Parts};

use super::rate_limit::client_ip;

/// Client IP and user agent of the current request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Visitor {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for Visitor {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|ua| !ua.is_empty())
            .map(String::from);

        Ok(Self {
            ip: client_ip(&parts.headers, &parts.extensions),
            user_agent,
        })
    }
}
