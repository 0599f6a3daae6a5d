//! Outbound services used by the storefront.
//!
//! - `accounts` - Accounts API client (register, login, me, refresh, logout)

pub mod accounts;

pub use accounts::{AccountsClient, AccountsError};
