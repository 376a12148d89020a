//! Cart route handlers.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use super::json_body;
use crate::error::Envelope;
use crate::middleware::Identity;
use crate::services::CartView;
use crate::state::AppState;

/// Body of add and set requests.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CartItemRequest {
    #[serde(alias = "productId", alias = "id")]
    pub product_id: String,
    #[serde(alias = "size")]
    pub variant: Option<String>,
    /// Loosely typed; coerced by the cart store.
    pub quantity: Value,
}

/// Read the cart, dropping entries that are no longer valid.
///
/// GET /api/cart
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, identity: Identity) -> Envelope<CartView> {
    state.carts().read(identity.buyer).await
}

/// Add to the cart.
///
/// POST /api/cart/items
#[instrument(skip(state, body))]
pub async fn add(
    State(state): State<AppState>,
    identity: Identity,
    body: Result<Json<CartItemRequest>, JsonRejection>,
) -> Envelope<CartView> {
    match json_body(body) {
        Ok(item) => {
            state
                .carts()
                .add(
                    identity.buyer,
                    &item.product_id,
                    item.variant.as_deref(),
                    &item.quantity,
                )
                .await
        }
        Err(e) => Envelope::failure(&e),
    }
}

/// Overwrite a quantity.
///
/// PUT /api/cart/items
#[instrument(skip(state, body))]
pub async fn set(
    State(state): State<AppState>,
    identity: Identity,
    body: Result<Json<CartItemRequest>, JsonRejection>,
) -> Envelope<CartView> {
    match json_body(body) {
        Ok(item) => {
            state
                .carts()
                .set(
                    identity.buyer,
                    &item.product_id,
                    item.variant.as_deref(),
                    &item.quantity,
                )
                .await
        }
        Err(e) => Envelope::failure(&e),
    }
}

/// Empty the cart.
///
/// DELETE /api/cart
#[instrument(skip(state))]
pub async fn clear(State(state): State<AppState>, identity: Identity) -> Envelope<CartView> {
    state.carts().clear(identity.buyer).await
}
