//! Business logic services.
//!
//! - `cart` - Cart store operations and catalog reconciliation
//! - `orders` - Order lifecycle: checkout, retrieval, status, payment
//! - `notifications` - Notification sink and the buyer's feed
//! - `retry` - Bounded polling for lagging reads

pub mod cart;
pub mod notifications;
pub mod orders;
pub mod retry;

pub use cart::{CartService, CartView};
pub use notifications::{
    NotificationError, NotificationFeed, NotificationService, NotificationSink, Notifier,
};
pub use orders::{CheckoutReceipt, CheckoutRequest, OrderService};
pub use retry::RetryPolicy;
