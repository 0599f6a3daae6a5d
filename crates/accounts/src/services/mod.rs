//! Business logic services.

pub mod auth;
pub mod products;

pub use auth::{AuthError, AuthService, Authenticated};
pub use products::{CacheStatus, ProductCatalog};
