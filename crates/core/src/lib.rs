//! Fulfillment Core - Shared types library.
//!
//! This crate provides the domain types used across the fulfillment components:
//! - `storefront` - Cart, checkout and order lifecycle service
//! - `cli` - Command-line tools for migrations and order administration
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be used
//! anywhere.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, statuses, money, cart keys, orders and notifications
//! - [`address`] - Shipping address normalization

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod address;
pub mod types;

pub use address::{RawAddress, ShippingAddress, normalize_address};
pub use types::*;
