//! Product catalog lookups.

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use fulfillment_core::ProductRef;

use super::RepositoryError;

/// Errors from catalog lookups.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The reference cannot be looked up at all.
    #[error("malformed product reference: {0}")]
    MalformedReference(String),

    /// The catalog store failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Existence checks against the live catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Whether the product currently exists.
    async fn exists(&self, product: &ProductRef) -> Result<bool, CatalogError>;
}

/// `PostgreSQL`-backed [`Catalog`].
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    /// Create a new catalog client.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn exists(&self, product: &ProductRef) -> Result<bool, CatalogError> {
        if !product.is_well_formed() {
            return Err(CatalogError::MalformedReference(product.to_string()));
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM fulfillment.product WHERE id = $1)",
        )
        .bind(product.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(exists)
    }
}
