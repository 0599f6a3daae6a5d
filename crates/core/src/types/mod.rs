//! Core types for Shopfront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod checkout;
pub mod email;
pub mod forms;
pub mod id;
pub mod money;
pub mod product;
pub mod user;

pub use cart::{Cart, CartError, CartItem, CartKey};
pub use checkout::CheckoutStep;
pub use email::{Email, EmailError};
pub use forms::{FieldErrors, LoginForm, PaymentForm, RegisterForm, ShippingForm};
pub use id::*;
pub use money::Money;
pub use product::{Product, ProductError, ProductId};
pub use user::{AuthTokens, PublicUser, SessionUser, TokenKind};
