//! Kibble storefront cart engine.
//!
//! The client-held cart of the Kibble pet-food storefront: a local snapshot
//! of the remote cart with optimistic edits, purchase-mode selection,
//! pricing with the subscription discount, and the checkout flow that pays,
//! places orders and reconciles the cart afterwards.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod state;
