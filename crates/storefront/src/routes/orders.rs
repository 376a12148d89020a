//! Buyer-facing order routes.

use std::future::Future;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde::Deserialize;
use tokio::task::JoinError;
use tracing::{Instrument, instrument};

use fulfillment_core::Order;

use super::json_body;
use crate::error::{AppError, Envelope};
use crate::middleware::{Identity, RequirePaymentProvider};
use crate::services::{CheckoutReceipt, CheckoutRequest};
use crate::state::AppState;

/// Outcome reported by the payment provider.
#[derive(Debug, Deserialize)]
pub struct PaymentOutcome {
    #[serde(alias = "success")]
    pub succeeded: bool,
}

/// Place an order.
///
/// POST /api/orders
///
/// Creation runs on its own task so that a client disconnect cannot abort
/// a checkout halfway through.
#[instrument(skip(state, body))]
pub async fn create(
    State(state): State<AppState>,
    identity: Identity,
    body: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Envelope<CheckoutReceipt> {
    let request = match json_body(body) {
        Ok(request) => request,
        Err(e) => return Envelope::failure(&e),
    };

    let orders = state.orders().clone();
    let buyer = identity.buyer;
    match run_detached(async move { orders.create_order(buyer, request).await }).await {
        Ok(envelope) => envelope,
        Err(e) => Envelope::failure(&AppError::Internal(format!("checkout task failed: {e}"))),
    }
}

/// The buyer's orders.
///
/// GET /api/orders
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>, identity: Identity) -> Envelope<Vec<Order>> {
    state.orders().list_orders(identity.buyer).await
}

/// One of the buyer's orders.
///
/// GET /api/orders/{id}
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<String>,
) -> Envelope<Order> {
    state.orders().get_order_by_id(identity.buyer, &id).await
}

/// Payment provider callback.
///
/// POST /api/orders/{id}/payment
///
/// Only the payment provider role (or an administrator) may report outcomes.
#[instrument(skip(state, _provider, body))]
pub async fn payment(
    State(state): State<AppState>,
    _provider: RequirePaymentProvider,
    Path(id): Path<String>,
    body: Result<Json<PaymentOutcome>, JsonRejection>,
) -> Envelope<Order> {
    match json_body(body) {
        Ok(outcome) => state.orders().confirm_payment(&id, outcome.succeeded).await,
        Err(e) => Envelope::failure(&e),
    }
}

/// Run `future` on its own task, inside the caller's span.
async fn run_detached<F>(future: F) -> Result<F::Output, JoinError>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(future.in_current_span()).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tracing::{Span, info_span};

    use super::*;

    #[tokio::test]
    async fn test_detached_task_keeps_request_span() {
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry());
        let span = info_span!("http_request");
        let expected = span.id();
        assert!(expected.is_some());

        let seen = run_detached(async { Span::current().id() })
            .instrument(span)
            .await
            .unwrap();
        assert_eq!(seen, expected);
    }
}
