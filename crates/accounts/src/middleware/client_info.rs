//! Client IP and device details recorded on each new session.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{Extensions, HeaderMap, header::USER_AGENT, request::Parts};
use chrono::{DateTime, TimeDelta, Utc};

use crate::store::NewSession;
use crate::tokens::{self, REFRESH_TOKEN_TTL_SECS};

/// Device name used when the request has no `User-Agent`.
pub const UNKNOWN_DEVICE: &str = "Unknown Device";

/// Resolve the client IP: first `X-Forwarded-For` entry, then `X-Real-IP`,
/// then the peer address.
#[must_use]
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<IpAddr> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    };

    let peer = || {
        extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    };

    forwarded.or_else(real_ip).or_else(peer)
}

/// Where a login or registration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: String,
    pub device: String,
}

impl ClientInfo {
    /// Details for a session opened now, generating a device id if the
    /// client did not send one.
    #[must_use]
    pub fn new_session(&self, device_id: Option<String>, now: DateTime<Utc>) -> NewSession {
        NewSession {
            ip_address: self.ip_address.clone(),
            device: self.device.clone(),
            device_id: device_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(tokens::generate_device_id),
            expires_at: now + TimeDelta::seconds(REFRESH_TOKEN_TTL_SECS),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip_address = client_ip(&parts.headers, &parts.extensions)
            .map_or_else(|| "unknown".to_string(), |ip| ip.to_string());

        let device = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|ua| !ua.is_empty())
            .unwrap_or(UNKNOWN_DEVICE)
            .to_string();

        Ok(Self { ip_address, device })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(request: Request<()>) -> ClientInfo {
        let (mut parts, ()) = request.into_parts();
        ClientInfo::from_request_parts(&mut parts, &()).await.unwrap()
    }

    #[tokio::test]
    async fn test_forwarded_headers() {
        let info = extract(
            Request::builder()
                .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
                .header("x-real-ip", "198.51.100.1")
                .header(USER_AGENT, "Mozilla/5.0")
                .body(())
                .unwrap(),
        )
        .await;
        assert_eq!(info.ip_address, "203.0.113.7");
        assert_eq!(info.device, "Mozilla/5.0");

        let info = extract(
            Request::builder()
                .header("x-real-ip", "198.51.100.1")
                .body(())
                .unwrap(),
        )
        .await;
        assert_eq!(info.ip_address, "198.51.100.1");
        assert_eq!(info.device, UNKNOWN_DEVICE);
    }

    #[tokio::test]
    async fn test_peer_address_fallback() {
        let mut request = Request::builder().body(()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo("192.0.2.4:5555".parse::<SocketAddr>().unwrap()));
        assert_eq!(extract(request).await.ip_address, "192.0.2.4");

        let request = Request::builder().body(()).unwrap();
        assert_eq!(extract(request).await.ip_address, "unknown");
    }

    #[test]
    fn test_new_session_device_id() {
        let info = ClientInfo {
            ip_address: "127.0.0.1".to_string(),
            device: UNKNOWN_DEVICE.to_string(),
        };
        let now = Utc::now();

        let session = info.new_session(Some("my-phone".to_string()), now);
        assert_eq!(session.device_id, "my-phone");
        assert_eq!((session.expires_at - now).num_days(), 7);

        let session = info.new_session(Some("  ".to_string()), now);
        assert_eq!(session.device_id.len(), 32);
        assert_eq!(info.new_session(None, now).device_id.len(), 32);
    }
}
