//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID
//! 4. CSP nonce
//! 5. Security headers (reads the nonce)
//! 6. Session layer (tower-sessions, `PostgreSQL` or in-memory store)
//! 7. Rate limiting on `/auth` (governor), when enabled

pub mod auth;
pub mod csp;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;
pub mod visitor;

pub use auth::{OptionalAuth, RequireAuth, clear_auth, is_htmx, set_current_user};
pub use csp::{CspNonce, csp_nonce_middleware};
pub use rate_limit::auth_rate_limiter;
pub use request_id::{RequestId, request_id_middleware};
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
pub use visitor::Visitor;
