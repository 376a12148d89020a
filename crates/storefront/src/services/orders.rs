//! Order lifecycle: checkout, retrieval, status transitions and payment.
//!
//! Every public operation returns an [`Envelope`]; failures never escape as
//! errors. Reads of just-written orders go through the [`RetryPolicy`]
//! schedules in [`ConsistencyConfig`] because the order store may lag its
//! own writes.
//!
//! [`RetryPolicy`]: super::retry::RetryPolicy

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use fulfillment_core::{
    BuyerId, LineItem, NewNotification, NotificationKind, Order, OrderId, OrderStatus,
    PaymentMethod, PaymentStatus, RawAddress, SubmittedItem, coerce_amount, normalize_address,
};

use super::cart::CartService;
use super::notifications::{NotificationSink, Notifier};
use crate::config::ConsistencyConfig;
use crate::db::OrderRepository;
use crate::error::{AppError, Envelope};

/// Orders returned by the admin listing when no limit is given.
const DEFAULT_ADMIN_LIMIT: i64 = 100;
const MAX_ADMIN_LIMIT: i64 = 500;

/// A checkout submission as sent by the client.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CheckoutRequest {
    pub items: Vec<SubmittedItem>,
    /// Total charged; malformed or negative values become zero.
    pub amount: Value,
    #[serde(alias = "shippingAddress", alias = "address")]
    pub shipping_address: Option<RawAddress>,
    /// Payment method tag; absent means cash on delivery.
    #[serde(alias = "paymentMethod")]
    pub payment_method: Option<String>,
}

/// Result of a successful checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
    pub order: Order,
    /// The cart was not cleared server-side and the client must clear its
    /// copy (or wait for payment confirmation).
    pub requires_cart_clear: bool,
}

/// Orchestrates order creation and status changes.
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    carts: CartService,
    notifier: Notifier,
    consistency: ConsistencyConfig,
}

impl OrderService {
    /// Create a new order service.
    #[must_use]
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        carts: CartService,
        notifier: Arc<dyn NotificationSink>,
        consistency: ConsistencyConfig,
    ) -> Self {
        Self {
            orders,
            carts,
            notifier: Notifier::new(notifier),
            consistency,
        }
    }

    /// Wait for notifications dispatched so far to be delivered.
    pub async fn flush_notifications(&self) {
        self.notifier.drain().await;
    }

    /// Place an order from a checkout submission.
    ///
    /// Cash-on-delivery orders clear the buyer's cart immediately. Other
    /// payment methods leave it for [`OrderService::confirm_payment`].
    #[instrument(skip(self, request), fields(buyer_id = ?buyer))]
    pub async fn create_order(
        &self,
        buyer: Option<BuyerId>,
        request: CheckoutRequest,
    ) -> Envelope<CheckoutReceipt> {
        Envelope::from_result(
            self.try_create_order(buyer, request).await,
            "Order placed successfully",
        )
    }

    /// Fetch one of the buyer's orders, retrying while the store catches up.
    #[instrument(skip(self))]
    pub async fn get_order_by_id(&self, buyer: Option<BuyerId>, order_id: &str) -> Envelope<Order> {
        Envelope::from_result(self.try_get_order(buyer, order_id).await, "Order found")
    }

    /// The buyer's orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, buyer: Option<BuyerId>) -> Envelope<Vec<Order>> {
        let result = match require_buyer(buyer) {
            Ok(buyer) => self.orders.list_for_buyer(buyer).await.map_err(AppError::from),
            Err(e) => Err(e),
        };
        Envelope::from_result(result, "Orders loaded")
    }

    /// All orders, newest first. `limit` is clamped to `1..=500`.
    #[instrument(skip(self))]
    pub async fn list_all_orders(&self, limit: Option<i64>) -> Envelope<Vec<Order>> {
        let limit = limit
            .unwrap_or(DEFAULT_ADMIN_LIMIT)
            .clamp(1, MAX_ADMIN_LIMIT);
        Envelope::from_result(
            self.orders.list_recent(limit).await.map_err(AppError::from),
            "Orders loaded",
        )
    }

    /// Assign a new status (and optionally a payment status).
    ///
    /// Any status may follow any other. Moving to confirmed, shipped or
    /// delivered notifies the buyer.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: &str,
        status: Option<&str>,
        payment_status: Option<&str>,
    ) -> Envelope<Order> {
        Envelope::from_result(
            self.try_update_status(order_id, status, payment_status).await,
            "Order status updated",
        )
    }

    /// Record the outcome of an online payment.
    ///
    /// A successful payment marks the order paid and clears the buyer's
    /// cart. Orders already paid are returned unchanged.
    #[instrument(skip(self))]
    pub async fn confirm_payment(&self, order_id: &str, succeeded: bool) -> Envelope<Order> {
        Envelope::from_result(
            self.try_confirm_payment(order_id, succeeded).await,
            "Payment recorded",
        )
    }

    /// Permanently delete an order and its history entry.
    #[instrument(skip(self))]
    pub async fn purge_order(&self, order_id: &str) -> Envelope<OrderId> {
        Envelope::from_result(self.try_purge_order(order_id).await, "Order purged")
    }

    async fn try_create_order(
        &self,
        buyer: Option<BuyerId>,
        request: CheckoutRequest,
    ) -> Result<CheckoutReceipt, AppError> {
        let buyer = require_buyer(buyer)?;
        if request.items.is_empty() {
            return Err(AppError::rejected("Order must contain at least one item"));
        }
        let Some(raw_address) = request.shipping_address.as_ref() else {
            return Err(AppError::rejected("Shipping address is required"));
        };

        let address = normalize_address(raw_address);
        let items = request.items.iter().map(LineItem::from_submitted).collect();
        let method = PaymentMethod::from_tag(request.payment_method.as_deref());
        let order = Order::new(
            buyer,
            items,
            coerce_amount(&request.amount),
            address,
            method,
            Utc::now(),
        );

        self.orders.insert(&order).await?;
        info!(
            order_id = %order.id,
            buyer_id = %buyer,
            amount = %order.amount,
            payment_method = %method,
            "Order created"
        );

        if let Err(e) = self.orders.append_history(buyer, order.id).await {
            warn!(order_id = %order.id, error = %e, "Failed to record order history");
        }

        let requires_cart_clear = match method {
            PaymentMethod::CashOnDelivery => match self.carts.clear_for(buyer).await {
                Ok(()) => false,
                Err(e) => {
                    warn!(order_id = %order.id, error = %e, "Failed to clear cart after checkout");
                    true
                }
            },
            PaymentMethod::Online => true,
        };

        self.notifier.dispatch(created_notification(&order)).await;
        self.verify_persisted(&order).await;

        Ok(CheckoutReceipt {
            order_id: order.id,
            order,
            requires_cart_clear,
        })
    }

    /// Re-read a just-created order. A miss is logged only; the insert has
    /// already succeeded.
    async fn verify_persisted(&self, order: &Order) {
        let policy = &self.consistency.verify;
        match policy
            .poll(|| self.orders.find_for_buyer(order.id, order.buyer_id))
            .await
        {
            Some((_, attempt)) => debug!(order_id = %order.id, attempt, "Order verified"),
            None => warn!(
                order_id = %order.id,
                attempts = policy.attempts(),
                "Order not visible after creation"
            ),
        }
    }

    async fn try_get_order(
        &self,
        buyer: Option<BuyerId>,
        order_id: &str,
    ) -> Result<Order, AppError> {
        let buyer = require_buyer(buyer)?;
        let id = parse_order_id(order_id)?;

        if let Some((order, attempt)) = self
            .consistency
            .lookup
            .poll(|| self.orders.find_for_buyer(id, buyer))
            .await
        {
            debug!(order_id = %id, attempt, "Order found");
            return Ok(order);
        }

        match self.orders.find(id).await? {
            Some(_) => {
                warn!(order_id = %id, buyer_id = %buyer, "Order requested by non-owner");
                Err(AppError::Forbidden(
                    "You do not have access to this order".to_owned(),
                ))
            }
            None => Err(AppError::not_found("Order not found")),
        }
    }

    async fn try_update_status(
        &self,
        order_id: &str,
        status: Option<&str>,
        payment_status: Option<&str>,
    ) -> Result<Order, AppError> {
        let id = parse_order_id(order_id)?;
        let status: OrderStatus = status
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::rejected("Order status is required"))?
            .parse()
            .map_err(AppError::Rejected)?;
        let payment_status = payment_status
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<PaymentStatus>)
            .transpose()
            .map_err(AppError::Rejected)?;

        let mut order = self
            .orders
            .find(id)
            .await?
            .ok_or_else(|| AppError::not_found("Order not found"))?;

        let previous = order.status;
        order.status = status;
        if let Some(payment_status) = payment_status {
            order.payment_status = payment_status;
        }
        order.updated_at = Utc::now();

        if !self.orders.save_status(&order).await? {
            return Err(AppError::not_found("Order not found"));
        }
        info!(order_id = %id, from = %previous, to = %status, "Order status updated");

        if let Some(notification) = status_notification(&order) {
            self.notifier.dispatch(notification).await;
        }
        Ok(order)
    }

    async fn try_confirm_payment(&self, order_id: &str, succeeded: bool) -> Result<Order, AppError> {
        let id = parse_order_id(order_id)?;
        let Some((mut order, _)) = self
            .consistency
            .lookup
            .poll(|| self.orders.find(id))
            .await
        else {
            return Err(AppError::not_found("Order not found"));
        };

        if order.payment_method == PaymentMethod::CashOnDelivery {
            return Err(AppError::rejected(
                "Cash-on-delivery orders are not paid online",
            ));
        }
        if order.payment_status == PaymentStatus::Paid {
            debug!(order_id = %id, "Payment already recorded");
            return Ok(order);
        }

        order.payment_status = if succeeded {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Failed
        };
        order.updated_at = Utc::now();
        if !self.orders.save_status(&order).await? {
            return Err(AppError::not_found("Order not found"));
        }
        info!(order_id = %id, payment_status = %order.payment_status, "Payment recorded");

        if succeeded {
            if let Err(e) = self.carts.clear_for(order.buyer_id).await {
                warn!(order_id = %id, error = %e, "Failed to clear cart after payment");
            }
        }
        self.notifier
            .dispatch(payment_notification(&order, succeeded))
            .await;

        Ok(order)
    }

    async fn try_purge_order(&self, order_id: &str) -> Result<OrderId, AppError> {
        let id = parse_order_id(order_id)?;
        if !self.orders.purge(id).await? {
            return Err(AppError::not_found("Order not found"));
        }
        info!(order_id = %id, "Order purged");
        Ok(id)
    }
}

fn require_buyer(buyer: Option<BuyerId>) -> Result<BuyerId, AppError> {
    buyer.ok_or_else(|| AppError::rejected("Buyer is not identified"))
}

fn parse_order_id(raw: &str) -> Result<OrderId, AppError> {
    OrderId::parse(raw).map_err(|_| AppError::rejected("Invalid order id"))
}

fn order_link(id: OrderId) -> String {
    format!("/orders/{id}")
}

fn created_notification(order: &Order) -> NewNotification {
    NewNotification::new(
        order.buyer_id,
        NotificationKind::Order,
        "Order placed",
        format!(
            "Your order #{} has been placed successfully.",
            order.id.short_code()
        ),
    )
    .with_link(order_link(order.id))
}

/// The buyer-facing message for a status, if that status has one.
fn status_notification(order: &Order) -> Option<NewNotification> {
    let code = order.id.short_code();
    let (title, message) = match order.status {
        OrderStatus::Confirmed => (
            "Order confirmed",
            format!("Your order #{code} has been confirmed and is being prepared."),
        ),
        OrderStatus::Shipped => ("Order shipped", format!("Your order #{code} is on its way.")),
        OrderStatus::Delivered => (
            "Order delivered",
            format!("Your order #{code} has been delivered. Enjoy!"),
        ),
        OrderStatus::Pending | OrderStatus::Cancelled => return None,
    };
    Some(
        NewNotification::new(order.buyer_id, NotificationKind::Order, title, message)
            .with_link(order_link(order.id)),
    )
}

fn payment_notification(order: &Order, succeeded: bool) -> NewNotification {
    let code = order.id.short_code();
    let notification = if succeeded {
        NewNotification::new(
            order.buyer_id,
            NotificationKind::Success,
            "Payment received",
            format!("We received the payment for order #{code}."),
        )
    } else {
        NewNotification::new(
            order.buyer_id,
            NotificationKind::Error,
            "Payment failed",
            format!("Payment for order #{code} did not go through. Your cart has been kept."),
        )
    };
    notification.with_link(order_link(order.id))
}
