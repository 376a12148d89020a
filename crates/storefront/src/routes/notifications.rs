//! Notification feed routes.

use axum::extract::State;
use tracing::instrument;

use crate::error::Envelope;
use crate::middleware::Identity;
use crate::services::NotificationFeed;
use crate::state::AppState;

/// GET /api/notifications
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>, identity: Identity) -> Envelope<NotificationFeed> {
    state.notifications().list(identity.buyer).await
}

/// POST /api/notifications/read-all
#[instrument(skip(state))]
pub async fn read_all(State(state): State<AppState>, identity: Identity) -> Envelope<u64> {
    state.notifications().mark_all_read(identity.buyer).await
}
