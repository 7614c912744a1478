//! Kibble Core - Shared types library.
//!
//! This crate provides the domain types used across all Kibble components:
//! - `storefront` - Cart engine, remote API client and checkout flow
//! - `cli` - Command-line driver over the cart engine
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, money, cart line items and checkout phases

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
