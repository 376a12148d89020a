//! Orders and their line items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::cart::ProductRef;
use super::id::{BuyerId, OrderId};
use super::money::{coerce_amount, coerce_quantity};
use super::status::{OrderStatus, PaymentMethod, PaymentStatus};
use crate::address::ShippingAddress;

/// Name recorded for line items submitted without one.
pub const UNNAMED_PRODUCT: &str = "Unnamed product";

/// A line item as submitted by the checkout client.
///
/// Every field is optional and loosely typed; [`LineItem::from_submitted`]
/// applies the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubmittedItem {
    #[serde(alias = "productId", alias = "id")]
    pub product_id: Option<String>,
    pub name: Option<String>,
    pub price: Value,
    pub quantity: Value,
    /// List-valued image field; the first string entry wins.
    pub images: Value,
    /// Singular fallback image field.
    pub image: Option<String>,
    #[serde(alias = "size")]
    pub variant: Option<String>,
}

/// A persisted order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductRef,
    pub name: String,
    /// Unit price, never negative.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Always at least 1.
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl LineItem {
    /// Project a submitted item into a line item, defaulting what is missing.
    #[must_use]
    pub fn from_submitted(item: &SubmittedItem) -> Self {
        let name = item
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(UNNAMED_PRODUCT)
            .to_owned();

        let image = first_image(&item.images).or_else(|| {
            item.image
                .as_deref()
                .map(str::trim)
                .filter(|i| !i.is_empty())
                .map(str::to_owned)
        });

        Self {
            product_id: ProductRef::new(item.product_id.as_deref().unwrap_or_default().trim()),
            name,
            price: coerce_amount(&item.price),
            quantity: coerce_quantity(&item.quantity),
            image,
            variant: item
                .variant
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned),
        }
    }

}

fn first_image(images: &Value) -> Option<String> {
    match images {
        Value::Array(list) => list
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_owned),
        _ => None,
    }
}

/// A placed order.
///
/// Immutable after creation except for `status`, `payment_status` and
/// `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub buyer_id: BuyerId,
    pub items: Vec<LineItem>,
    /// Caller-supplied total, never negative.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// A fresh pending order with a newly generated id.
    #[must_use]
    pub fn new(
        buyer_id: BuyerId,
        items: Vec<LineItem>,
        amount: Decimal,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderId::generate(),
            buyer_id,
            items,
            amount,
            shipping_address,
            payment_method,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}
