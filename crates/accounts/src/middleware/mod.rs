//! Request extractors and middleware for the accounts API.

pub mod auth;
pub mod client_info;
pub mod rate_limit;

pub use auth::{RequireAuth, presented_token, refresh_cookie};
pub use client_info::{ClientInfo, UNKNOWN_DEVICE};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
