//! Order repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use fulfillment_core::{BuyerId, LineItem, Order, OrderId, ShippingAddress};

use super::{RepositoryError, conflict_or_database};

/// Durable store of orders and the per-buyer order history.
///
/// Reads may be served by replicas and can lag a preceding write; callers
/// that need read-after-write use a retry policy around `find*`.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persist a new order.
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError>;

    /// Look up an order owned by `buyer`.
    async fn find_for_buyer(
        &self,
        id: OrderId,
        buyer: BuyerId,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Look up an order regardless of owner.
    async fn find(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Write back `status`, `payment_status` and `updated_at`.
    ///
    /// Returns `false` if the order no longer exists.
    async fn save_status(&self, order: &Order) -> Result<bool, RepositoryError>;

    /// A buyer's orders, newest first.
    async fn list_for_buyer(&self, buyer: BuyerId) -> Result<Vec<Order>, RepositoryError>;

    /// All orders, newest first.
    async fn list_recent(&self, limit: i64) -> Result<Vec<Order>, RepositoryError>;

    /// Record an order in the buyer's history.
    async fn append_history(&self, buyer: BuyerId, id: OrderId) -> Result<(), RepositoryError>;

    /// Delete an order and its history entry. Returns `false` if absent.
    async fn purge(&self, id: OrderId) -> Result<bool, RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    buyer_id: Uuid,
    items: Json<Vec<LineItem>>,
    amount: Decimal,
    shipping_address: Json<ShippingAddress>,
    payment_method: String,
    status: String,
    payment_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt = move |e: String| RepositoryError::DataCorruption(format!("order {id}: {e}"));

        Ok(Self {
            id: OrderId::new(row.id),
            buyer_id: BuyerId::new(row.buyer_id),
            items: row.items.0,
            amount: row.amount,
            shipping_address: row.shipping_address.0,
            payment_method: row.payment_method.parse().map_err(corrupt)?,
            status: row.status.parse().map_err(corrupt)?,
            payment_status: row.payment_status.parse().map_err(corrupt)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, buyer_id, items, amount, shipping_address, payment_method, \
                             status, payment_status, created_at, updated_at";

/// `PostgreSQL`-backed [`OrderRepository`].
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn insert(&self, order: &Order) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO fulfillment.customer_order (
                id, buyer_id, items, amount, shipping_address, payment_method,
                status, payment_status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(order.id)
        .bind(order.buyer_id)
        .bind(Json(&order.items))
        .bind(order.amount)
        .bind(Json(&order.shipping_address))
        .bind(order.payment_method.as_str())
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "order"))?;

        Ok(())
    }

    async fn find_for_buyer(
        &self,
        id: OrderId,
        buyer: BuyerId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM fulfillment.customer_order WHERE id = $1 AND buyer_id = $2"
        ))
        .bind(id)
        .bind(buyer)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM fulfillment.customer_order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn save_status(&self, order: &Order) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE fulfillment.customer_order
            SET status = $2, payment_status = $3, updated_at = $4
            WHERE id = $1
            ",
        )
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_for_buyer(&self, buyer: BuyerId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM fulfillment.customer_order \
             WHERE buyer_id = $1 ORDER BY created_at DESC"
        ))
        .bind(buyer)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM fulfillment.customer_order \
             ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn append_history(&self, buyer: BuyerId, id: OrderId) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO fulfillment.buyer_order (buyer_id, order_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(buyer)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn purge(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM fulfillment.buyer_order WHERE order_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM fulfillment.customer_order WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}
