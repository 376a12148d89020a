//! Unified error handling and the result envelope.
//!
//! Service internals return `Result<T, AppError>`. Public operations turn
//! that into an [`Envelope`], the uniform `{ok, message, payload}` result
//! every caller receives. Server-side failures are captured to Sentry before
//! the envelope is built; their details never reach the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Storage operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// A precondition failed; nothing was read or written.
    #[error("{0}")]
    Rejected(String),

    /// The referenced resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The resource exists but belongs to someone else.
    #[error("{0}")]
    Forbidden(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for [`AppError::Rejected`].
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Shorthand for [`AppError::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// The machine-readable failure category.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Rejected(_) => FailureKind::Rejected,
            Self::NotFound(_) => FailureKind::NotFound,
            Self::Forbidden(_) => FailureKind::Forbidden,
            Self::Database(_) | Self::Internal(_) => FailureKind::Internal,
        }
    }

    /// Message safe to show to the caller.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Failure category carried by an unsuccessful [`Envelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Rejected,
    NotFound,
    Forbidden,
    Internal,
}

impl FailureKind {
    /// HTTP status used when the envelope is sent over HTTP.
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::Rejected => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Uniform result of every public operation.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureKind>,
}

impl<T> Envelope<T> {
    /// A successful result.
    pub fn success(message: impl Into<String>, payload: T) -> Self {
        Self {
            ok: true,
            message: message.into(),
            payload: Some(payload),
            error: None,
        }
    }

    /// A failed result. Server-side failures are reported to Sentry.
    #[must_use]
    pub fn failure(err: &AppError) -> Self {
        if err.kind() == FailureKind::Internal {
            let event_id = sentry::capture_error(err);
            tracing::error!(
                error = %err,
                sentry_event_id = %event_id,
                "Operation failed"
            );
        }

        Self {
            ok: false,
            message: err.public_message(),
            payload: None,
            error: Some(err.kind()),
        }
    }

    /// Wrap a service result, using `message` on success.
    pub fn from_result(result: Result<T, AppError>, message: impl Into<String>) -> Self {
        match result {
            Ok(payload) => Self::success(message, payload),
            Err(err) => Self::failure(&err),
        }
    }

    /// The failure category, if the operation failed.
    #[must_use]
    pub const fn error_kind(&self) -> Option<FailureKind> {
        self.error
    }

    /// Borrow the payload.
    #[must_use]
    pub const fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    /// Take the payload.
    #[must_use]
    pub fn into_payload(self) -> Option<T> {
        self.payload
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status = self.error.map_or(StatusCode::OK, FailureKind::status);
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        Envelope::<()>::failure(&self).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::not_found("Order not found");
        assert_eq!(err.to_string(), "Order not found");

        let err = AppError::Internal("boom".to_string());
        assert_eq!(err.to_string(), "Internal error: boom");
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_envelope_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::rejected("test")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::not_found("test")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Envelope::success("ok", 1).into_response().status(),
            StatusCode::OK
        );
    }

    #[test]
    fn test_envelope_json_shape() {
        let ok = serde_json::to_value(Envelope::success("Cart updated", 3)).unwrap();
        assert_eq!(
            ok,
            serde_json::json!({"ok": true, "message": "Cart updated", "payload": 3})
        );

        let failed =
            serde_json::to_value(Envelope::<()>::failure(&AppError::not_found("Order not found")))
                .unwrap();
        assert_eq!(
            failed,
            serde_json::json!({"ok": false, "message": "Order not found", "error": "not_found"})
        );
    }

    #[test]
    fn test_from_result_wraps_both_arms() {
        let ok = Envelope::from_result(Ok::<_, AppError>(5), "Loaded");
        assert!(ok.ok);
        assert_eq!(ok.message, "Loaded");
        assert_eq!(ok.payload(), Some(&5));

        let failed = Envelope::<u8>::from_result(Err(AppError::rejected("Bad input")), "Loaded");
        assert!(!failed.ok);
        assert_eq!(failed.message, "Bad input");
        assert_eq!(failed.error_kind(), Some(FailureKind::Rejected));
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let envelope = Envelope::<()>::failure(&AppError::Database(
            RepositoryError::DataCorruption("order 1: invalid order status".to_string()),
        ));
        assert!(!envelope.ok);
        assert_eq!(envelope.message, "Internal server error");
        assert_eq!(envelope.error_kind(), Some(FailureKind::Internal));
    }
}
