//! Order retrieval, administrative status updates and purge.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::{Method, StatusCode};
use fulfillment_core::{BuyerId, OrderId};
use fulfillment_integration_tests::TestContext;
use serde_json::json;

async fn place_order(ctx: &TestContext, buyer: BuyerId) -> OrderId {
    let response = ctx
        .send(
            Method::POST,
            "/api/orders",
            Some(buyer),
            Some(json!({
                "items": [{"productId": "p1", "name": "Tee", "price": "12.50", "quantity": 1}],
                "amount": "12.50",
                "address": {"name": "Doe"},
            })),
        )
        .await;
    assert!(response.ok(), "{}", response.body);
    OrderId::parse(response.payload()["order_id"].as_str().unwrap()).unwrap()
}

// =============================================================================
// Retrieval
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_owner_sees_order() {
    let ctx = TestContext::new();
    let buyer = BuyerId::generate();
    let id = place_order(&ctx, buyer).await;

    let response = ctx
        .send(Method::GET, &format!("/api/orders/{id}"), Some(buyer), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.payload()["shipping_address"]["last_name"], ".");
    assert_eq!(response.payload()["items"][0]["name"], "Tee");

    let list = ctx.send(Method::GET, "/api/orders", Some(buyer), None).await;
    assert_eq!(list.payload().as_array().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_permission_is_distinct_from_not_found() {
    let ctx = TestContext::new();
    let id = place_order(&ctx, BuyerId::generate()).await;
    let stranger = BuyerId::generate();

    let forbidden = ctx
        .send(Method::GET, &format!("/api/orders/{id}"), Some(stranger), None)
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    assert_eq!(forbidden.body["error"], "forbidden");

    let missing = ctx
        .send(
            Method::GET,
            &format!("/api/orders/{}", OrderId::generate()),
            Some(stranger),
            None,
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let lookups = ctx.orders.lookups().await;
    let malformed = ctx
        .send(Method::GET, "/api/orders/12345", Some(stranger), None)
        .await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert_eq!(ctx.orders.lookups().await, lookups);
}

// =============================================================================
// Status transitions
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_delivered_notifies_with_short_code() {
    let ctx = TestContext::new();
    let buyer = BuyerId::generate();
    let id = place_order(&ctx, buyer).await;
    let before = ctx.notifications.delivered().await.len();

    let response = ctx
        .send_as_admin(
            Method::PATCH,
            &format!("/api/admin/orders/{id}/status"),
            Some(json!({"status": "delivered", "paymentStatus": "paid"})),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(response.payload()["status"], "delivered");
    assert_eq!(response.payload()["payment_status"], "paid");

    let delivered = ctx.notifications.delivered().await;
    assert_eq!(delivered.len(), before + 1);
    assert!(delivered.last().unwrap().message.contains(&id.short_code()));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_emits_no_notification() {
    let ctx = TestContext::new();
    let id = place_order(&ctx, BuyerId::generate()).await;
    let before = ctx.notifications.delivered().await.len();

    let response = ctx
        .send_as_admin(
            Method::PATCH,
            &format!("/api/admin/orders/{id}/status"),
            Some(json!({"status": "cancelled"})),
        )
        .await;
    assert!(response.ok());
    assert_eq!(ctx.notifications.delivered().await.len(), before);
}

#[tokio::test(start_paused = true)]
async fn test_buyers_cannot_use_admin_routes() {
    let ctx = TestContext::new();
    let buyer = BuyerId::generate();
    let id = place_order(&ctx, buyer).await;

    let response = ctx
        .send(
            Method::PATCH,
            &format!("/api/admin/orders/{id}/status"),
            Some(buyer),
            Some(json!({"status": "delivered"})),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let purge = ctx
        .send(Method::DELETE, &format!("/api/admin/orders/{id}"), Some(buyer), None)
        .await;
    assert_eq!(purge.status, StatusCode::FORBIDDEN);
    assert_eq!(ctx.orders.len().await, 1);
}

// =============================================================================
// Purge
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_purge_is_terminal() {
    let ctx = TestContext::new();
    let buyer = BuyerId::generate();
    let id = place_order(&ctx, buyer).await;

    let purged = ctx
        .send_as_admin(Method::DELETE, &format!("/api/admin/orders/{id}"), None)
        .await;
    assert!(purged.ok());

    let lookup = ctx
        .send(Method::GET, &format!("/api/orders/{id}"), Some(buyer), None)
        .await;
    assert_eq!(lookup.status, StatusCode::NOT_FOUND);

    let update = ctx
        .send_as_admin(
            Method::PATCH,
            &format!("/api/admin/orders/{id}/status"),
            Some(json!({"status": "shipped"})),
        )
        .await;
    assert_eq!(update.status, StatusCode::NOT_FOUND);

    let all = ctx
        .send_as_admin(Method::GET, "/api/admin/orders", None)
        .await;
    assert_eq!(all.payload(), &json!([]));
}
