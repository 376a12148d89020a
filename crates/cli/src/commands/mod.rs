//! CLI command implementations.

pub mod migrate;
pub mod order;

use fulfillment_storefront::{config::ConfigError, config::FulfillmentConfig, db};
use sqlx::PgPool;
use thiserror::Error;

/// Errors shared by the commands.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The operation returned an unsuccessful envelope.
    #[error("{0}")]
    Failed(String),
}

/// Load configuration and connect to the fulfillment database.
async fn connect() -> Result<(FulfillmentConfig, PgPool), CommandError> {
    let config = FulfillmentConfig::from_env()?;
    tracing::info!("Connecting to fulfillment database...");
    let pool = db::create_pool(&config.database_url).await?;
    Ok((config, pool))
}
