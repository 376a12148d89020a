//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                         - Liveness
//! GET    /health/ready                   - Readiness (database ping)
//!
//! # Cart
//! GET    /api/cart                       - Read (reconciles against catalog)
//! POST   /api/cart/items                 - Add quantity
//! PUT    /api/cart/items                 - Set quantity (<= 0 removes)
//! DELETE /api/cart                       - Clear
//!
//! # Orders
//! POST   /api/orders                     - Checkout
//! GET    /api/orders                     - Buyer's orders
//! GET    /api/orders/{id}                - One order
//! POST   /api/orders/{id}/payment        - Payment outcome callback (payment provider)
//!
//! # Notifications
//! GET    /api/notifications              - Feed with unread count
//! POST   /api/notifications/read-all     - Mark all read
//!
//! # Admin (x-buyer-role: admin)
//! GET    /api/admin/orders               - All orders
//! PATCH  /api/admin/orders/{id}/status   - Update status
//! DELETE /api/admin/orders/{id}          - Purge
//! ```
//!
//! Every handler answers with an [`Envelope`](crate::error::Envelope).

pub mod admin;
pub mod cart;
pub mod health;
pub mod notifications;
pub mod orders;

use axum::{
    Json, Router,
    extract::rejection::JsonRejection,
    routing::{get, patch, post},
};

use crate::error::AppError;
use crate::state::AppState;

/// Unwrap a JSON body, turning a malformed one into a rejection.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|e| AppError::rejected(e.body_text()))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add).put(cart::set))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/{id}", get(orders::show))
        .route("/{id}/payment", post(orders::payment))
}

/// Create the notification routes router.
pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(notifications::index))
        .route("/read-all", post(notifications::read_all))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(admin::orders))
        .route("/orders/{id}/status", patch(admin::update_status))
        .route("/orders/{id}", axum::routing::delete(admin::purge))
}

/// Create all routes for the service.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/cart", cart_routes())
        .nest("/api/orders", order_routes())
        .nest("/api/notifications", notification_routes())
        .nest("/api/admin", admin_routes())
}
