//! Shopfront Core - Shared domain types.
//!
//! This crate provides the types shared by every Shopfront component:
//! - `storefront` - Server-rendered shop with cart and checkout
//! - `accounts` - Authentication API (login, register, logout, me)
//! - `cli` - Command-line tools for migrations and catalog checks
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. Cart arithmetic, checkout step sequencing and
//! form validation all live here so both binaries agree on them.
//!
//! # Modules
//!
//! - [`types`] - Newtypes, the cart, checkout steps and form schemas

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
