//! Core types for the fulfillment service.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod money;
pub mod notification;
pub mod order;
pub mod status;

pub use cart::{Cart, CartKey, ProductRef, RawCart, VARIANT_SEPARATOR, stored_quantity};
pub use id::*;
pub use money::{coerce_amount, coerce_quantity, parse_set_quantity};
pub use notification::{NewNotification, Notification, NotificationKind};
pub use order::{LineItem, Order, SubmittedItem};
pub use status::*;
