//! Fulfillment storefront library.
//!
//! Cart store, order lifecycle and notifications behind an axum router.
//! The binary in `main.rs` wires it to `PostgreSQL`; tests wire it to the
//! in-memory stores in [`db::memory`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, extract::Request};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the application router with request tracing.
///
/// Sentry layers are added by the binary.
pub fn app(state: AppState) -> Router {
    routes::routes()
        .layer(axum::middleware::from_fn(
            middleware::request_context_middleware,
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                    buyer_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Method, StatusCode, header},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use fulfillment_core::BuyerId;

    use super::*;
    use crate::config::ConsistencyConfig;
    use crate::db::memory::{
        MemoryCartStore, MemoryCatalog, MemoryNotificationStore, MemoryOrderStore,
    };
    use crate::middleware::{BUYER_ID_HEADER, BUYER_ROLE_HEADER, REQUEST_ID_HEADER};
    use crate::state::Stores;

    fn test_app() -> Router {
        let notifications = Arc::new(MemoryNotificationStore::new());
        app(AppState::from_stores(Stores {
            orders: Arc::new(MemoryOrderStore::new()),
            carts: Arc::new(MemoryCartStore::new()),
            catalog: Arc::new(MemoryCatalog::with_products(["p1"])),
            sink: notifications.clone(),
            notifications,
            consistency: ConsistencyConfig::default(),
        }))
    }

    fn request(method: Method, uri: &str, buyer: Option<BuyerId>, body: Option<Value>) -> Request {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        if let Some(buyer) = buyer {
            builder = builder.header(BUYER_ID_HEADER, buyer.to_string());
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, request: Request) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(request(Method::GET, "/health", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));

        let response = test_app()
            .oneshot(request(Method::GET, "/health/ready", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cart_round_trip_over_http() {
        let app = test_app();
        let buyer = BuyerId::generate();

        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/api/cart/items",
                Some(buyer),
                Some(json!({"productId": "p1", "size": "M", "quantity": 2})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["payload"]["items"], json!({"p1#M": 2}));

        let (_, body) = send(
            &app,
            request(
                Method::PUT,
                "/api/cart/items",
                Some(buyer),
                Some(json!({"productId": "p1", "size": "M", "quantity": 0})),
            ),
        )
        .await;
        assert_eq!(body["payload"]["items"], json!({}));

        let (status, body) = send(&app, request(Method::GET, "/api/cart", Some(buyer), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["payload"]["item_count"], 0);
    }

    #[tokio::test]
    async fn test_missing_buyer_is_rejected() {
        let (status, body) = send(&test_app(), request(Method::GET, "/api/cart", None, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "rejected");
    }

    #[tokio::test]
    async fn test_malformed_json_is_rejected_envelope() {
        let app = test_app();
        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/api/orders")
            .header(BUYER_ID_HEADER, BuyerId::generate().to_string())
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "rejected");
    }

    #[tokio::test]
    async fn test_checkout_then_fetch() {
        let app = test_app();
        let buyer = BuyerId::generate();

        let (status, body) = send(
            &app,
            request(
                Method::POST,
                "/api/orders",
                Some(buyer),
                Some(json!({
                    "items": [{"productId": "p1", "price": 10, "quantity": 2}],
                    "amount": 20,
                    "shippingAddress": {"street": "X", "city": "Y"},
                    "paymentMethod": "cod",
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["payload"]["order"]["status"], "pending");
        assert_eq!(body["payload"]["order"]["payment_method"], "cod");
        assert_eq!(body["payload"]["requires_cart_clear"], false);

        let id = body["payload"]["order_id"].as_str().unwrap().to_owned();
        let (status, body) = send(
            &app,
            request(Method::GET, &format!("/api/orders/{id}"), Some(buyer), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["payload"]["id"], id.as_str());

        let (status, _) = send(
            &app,
            request(Method::GET, "/api/orders/not-an-id", Some(buyer), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_routes_require_admin_role() {
        let app = test_app();
        let (status, body) = send(
            &app,
            request(Method::GET, "/api/admin/orders", Some(BuyerId::generate()), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");

        let admin = axum::http::Request::builder()
            .uri("/api/admin/orders?limit=10")
            .header(BUYER_ROLE_HEADER, "admin")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, admin).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["payload"], json!([]));
    }
}
