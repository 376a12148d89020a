//! Cart repository.
//!
//! Carts are stored verbatim as a JSONB object. Interpreting and cleaning
//! the entries is the cart service's job, not the repository's.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::types::Json;

use fulfillment_core::{BuyerId, RawCart};

use super::RepositoryError;

/// Persistence of each buyer's sparse cart mapping.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// The stored mapping; empty if the buyer has no cart yet.
    async fn load(&self, buyer: BuyerId) -> Result<RawCart, RepositoryError>;

    /// Replace the stored mapping. Last write wins.
    async fn store(&self, buyer: BuyerId, cart: &RawCart) -> Result<(), RepositoryError>;
}

/// `PostgreSQL`-backed [`CartRepository`].
#[derive(Clone)]
pub struct PgCartRepository {
    pool: PgPool,
}

impl PgCartRepository {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartRepository for PgCartRepository {
    async fn load(&self, buyer: BuyerId) -> Result<RawCart, RepositoryError> {
        let stored: Option<Json<Value>> =
            sqlx::query_scalar("SELECT items FROM fulfillment.cart WHERE buyer_id = $1")
                .bind(buyer)
                .fetch_optional(&self.pool)
                .await?;

        // A non-object document is treated like an empty cart and gets
        // replaced on the next write.
        Ok(match stored {
            Some(Json(Value::Object(map))) => map,
            Some(_) => {
                tracing::warn!(buyer_id = %buyer, "stored cart is not an object");
                RawCart::new()
            }
            None => RawCart::new(),
        })
    }

    async fn store(&self, buyer: BuyerId, cart: &RawCart) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO fulfillment.cart (buyer_id, items, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (buyer_id)
            DO UPDATE SET items = EXCLUDED.items, updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(buyer)
        .bind(Json(cart))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
