//! Integration tests for the fulfillment service.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p fulfillment-integration-tests
//! ```
//!
//! The scenarios drive the full axum router over the in-memory stores, so
//! they need no database. [`TestContext`] keeps handles to every store so
//! tests can seed state and inspect side effects.
//!
//! # Test Categories
//!
//! - `checkout` - Order creation and cart clearing
//! - `cart_reconciliation` - Catalog self-healing of stored carts
//! - `order_lifecycle` - Retrieval, status transitions, payment, purge

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use fulfillment_core::BuyerId;
use fulfillment_storefront::{
    app,
    config::ConsistencyConfig,
    db::memory::{MemoryCartStore, MemoryCatalog, MemoryNotificationStore, MemoryOrderStore},
    middleware::{BUYER_ID_HEADER, BUYER_ROLE_HEADER},
    state::{AppState, Stores},
};
use serde_json::Value;
use tower::ServiceExt;

/// Products present in the catalog of a fresh context.
pub const PRODUCTS: [&str; 3] = ["p1", "p2", "p3"];

/// A running application over in-memory stores.
pub struct TestContext {
    pub router: Router,
    pub state: AppState,
    pub orders: Arc<MemoryOrderStore>,
    pub carts: Arc<MemoryCartStore>,
    pub catalog: Arc<MemoryCatalog>,
    pub notifications: Arc<MemoryNotificationStore>,
}

/// A decoded response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestResponse {
    /// The envelope's `payload` field.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.body["payload"]
    }

    /// Whether the envelope reports success.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.body["ok"] == Value::Bool(true)
    }
}

impl TestContext {
    /// Context whose order store is always up to date.
    #[must_use]
    pub fn new() -> Self {
        Self::with_orders(MemoryOrderStore::new())
    }

    /// Context over a specific order store, e.g. one with read lag.
    #[must_use]
    pub fn with_orders(orders: MemoryOrderStore) -> Self {
        let orders = Arc::new(orders);
        let carts = Arc::new(MemoryCartStore::new());
        let catalog = Arc::new(MemoryCatalog::with_products(PRODUCTS));
        let notifications = Arc::new(MemoryNotificationStore::new());

        let state = AppState::from_stores(Stores {
            orders: orders.clone(),
            carts: carts.clone(),
            catalog: catalog.clone(),
            sink: notifications.clone(),
            notifications: notifications.clone(),
            consistency: ConsistencyConfig::default(),
        });

        Self {
            router: app(state.clone()),
            state,
            orders,
            carts,
            catalog,
            notifications,
        }
    }

    /// Send a request as `buyer` (if any) with an optional JSON body.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the router fails, which
    /// only happens on a broken test.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        buyer: Option<BuyerId>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(buyer) = buyer {
            builder = builder.header(BUYER_ID_HEADER, buyer.to_string());
        }
        self.dispatch(builder, body).await
    }

    /// Send a request with the admin role.
    ///
    /// # Panics
    ///
    /// See [`TestContext::send`].
    pub async fn send_as_admin(&self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        self.send_with_role(method, uri, "admin", body).await
    }

    /// Send a request carrying `role` and no buyer id.
    ///
    /// # Panics
    ///
    /// See [`TestContext::send`].
    pub async fn send_with_role(
        &self,
        method: Method,
        uri: &str,
        role: &str,
        body: Option<Value>,
    ) -> TestResponse {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(BUYER_ROLE_HEADER, role);
        self.dispatch(builder, body).await
    }

    /// Wait for notifications dispatched by earlier requests.
    pub async fn settle(&self) {
        self.state.orders().flush_notifications().await;
    }

    #[allow(clippy::unwrap_used)]
    async fn dispatch(&self, builder: axum::http::request::Builder, body: Option<Value>) -> TestResponse {
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        TestResponse {
            status,
            body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
