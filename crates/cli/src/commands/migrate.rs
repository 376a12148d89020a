//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! fulfillment-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `FULFILLMENT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Stored in `crates/storefront/migrations/`.

use super::{CommandError, connect};

/// Run the fulfillment database migrations.
pub async fn run() -> Result<(), CommandError> {
    let (_, pool) = connect().await?;

    tracing::info!("Running fulfillment migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Fulfillment migrations complete!");
    Ok(())
}
