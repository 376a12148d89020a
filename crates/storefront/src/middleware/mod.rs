//! HTTP middleware and extractors.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request context (request ID, buyer tag)

pub mod identity;
pub mod request_context;

pub use identity::{
    BUYER_ID_HEADER, BUYER_ROLE_HEADER, Identity, RequireAdmin, RequirePaymentProvider,
};
pub use request_context::{REQUEST_ID_HEADER, request_context_middleware};
