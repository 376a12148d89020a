//! Request ID and buyer tagging for tracing and Sentry correlation.
//!
//! Uses the upstream `x-request-id` when present, otherwise a fresh UUID v4.
//! The id and the buyer (if any) are recorded in the current span and the
//! Sentry scope, and the id is echoed in the response headers.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

use super::identity::BUYER_ID_HEADER;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Middleware tagging every request with a request id and the buyer.
pub async fn request_context_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);
    let buyer_id = request
        .headers()
        .get(BUYER_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned);

    let span = Span::current();
    span.record("request_id", request_id.as_str());
    if let Some(buyer_id) = &buyer_id {
        span.record("buyer_id", buyer_id.as_str());
    }

    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
        if let Some(buyer_id) = &buyer_id {
            scope.set_user(Some(sentry::User {
                id: Some(buyer_id.clone()),
                ..Default::default()
            }));
        }
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}
