//! Administrative order routes. All require the admin role.

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
};
use serde::Deserialize;
use tracing::instrument;

use fulfillment_core::{Order, OrderId};

use super::json_body;
use crate::error::Envelope;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
}

/// Body of a status update.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatusUpdate {
    pub status: Option<String>,
    #[serde(alias = "paymentStatus")]
    pub payment_status: Option<String>,
}

/// GET /api/admin/orders
#[instrument(skip(state, _admin))]
pub async fn orders(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(query): Query<ListQuery>,
) -> Envelope<Vec<Order>> {
    state.orders().list_all_orders(query.limit).await
}

/// PATCH /api/admin/orders/{id}/status
#[instrument(skip(state, _admin, body))]
pub async fn update_status(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<String>,
    body: Result<Json<StatusUpdate>, JsonRejection>,
) -> Envelope<Order> {
    match json_body(body) {
        Ok(update) => {
            state
                .orders()
                .update_status(
                    &id,
                    update.status.as_deref(),
                    update.payment_status.as_deref(),
                )
                .await
        }
        Err(e) => Envelope::failure(&e),
    }
}

/// DELETE /api/admin/orders/{id}
#[instrument(skip(state, _admin))]
pub async fn purge(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<String>,
) -> Envelope<OrderId> {
    state.orders().purge_order(&id).await
}
