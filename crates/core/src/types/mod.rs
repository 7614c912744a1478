//! Core types for Kibble.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod price;
pub mod status;

pub use cart::{
    CartLineItem, DeliveryCycle, ParseCodeError, ProductImage, ProductRef, PurchaseMode,
};
pub use id::*;
pub use price::{CurrencyCode, Price, format_won};
pub use status::CheckoutPhase;
