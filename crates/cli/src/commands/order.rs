//! Order administration commands.
//!
//! # Usage
//!
//! ```bash
//! # Mark an order shipped
//! fulfillment-cli order status 0b9e4c1a-7d2f-4e55-9a61-3c8f02ab5d9e shipped
//!
//! # Mark delivered and paid
//! fulfillment-cli order status 0b9e4c1a-7d2f-4e55-9a61-3c8f02ab5d9e delivered --payment paid
//!
//! # Permanently delete an order
//! fulfillment-cli order purge 0b9e4c1a-7d2f-4e55-9a61-3c8f02ab5d9e
//! ```
//!
//! These go through the same order service as the HTTP admin routes, so
//! status changes notify the buyer.

use fulfillment_storefront::error::Envelope;
use fulfillment_storefront::state::AppState;
use serde::Serialize;

use super::{CommandError, connect};

async fn state() -> Result<AppState, CommandError> {
    let (config, pool) = connect().await?;
    Ok(AppState::postgres(pool, config.consistency))
}

/// Print a successful payload, or turn a failed envelope into an error.
fn report<T: Serialize>(envelope: Envelope<T>) -> Result<(), CommandError> {
    if !envelope.ok {
        return Err(CommandError::Failed(envelope.message));
    }
    tracing::info!("{}", envelope.message);
    if let Some(payload) = envelope.payload() {
        let rendered = serde_json::to_string_pretty(payload)
            .map_err(|e| CommandError::Failed(e.to_string()))?;
        #[allow(clippy::print_stdout)]
        {
            println!("{rendered}");
        }
    }
    Ok(())
}

/// Assign a new status (and optionally a payment status) to an order.
pub async fn update_status(
    order_id: &str,
    status: &str,
    payment: Option<&str>,
) -> Result<(), CommandError> {
    let state = state().await?;
    let envelope = state
        .orders()
        .update_status(order_id, Some(status), payment)
        .await;
    state.orders().flush_notifications().await;
    report(envelope)
}

/// Permanently delete an order and its history entry.
pub async fn purge(order_id: &str) -> Result<(), CommandError> {
    let state = state().await?;
    report(state.orders().purge_order(order_id).await)
}
