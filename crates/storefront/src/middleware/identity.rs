//! Caller identity extractors.
//!
//! Authentication happens upstream. The gateway forwards the authenticated
//! buyer in `x-buyer-id` and their role in `x-buyer-role`. A missing or
//! unparseable buyer id is not rejected here: the services treat it as an
//! unidentified buyer and answer with a rejection envelope.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
    response::{IntoResponse, Response},
};
use tracing::debug;

use fulfillment_core::{BuyerId, Role};

use crate::error::AppError;

/// Header carrying the authenticated buyer id.
pub const BUYER_ID_HEADER: &str = "x-buyer-id";
/// Header carrying the caller's role.
pub const BUYER_ROLE_HEADER: &str = "x-buyer-role";

/// The caller as described by the gateway.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(identity: Identity) -> impl IntoResponse {
///     match identity.buyer {
///         Some(buyer) => format!("Hello, {buyer}!"),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Identity {
    pub buyer: Option<BuyerId>,
    pub role: Role,
}

impl Identity {
    /// Read the identity headers.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        let buyer = header(BUYER_ID_HEADER).and_then(|raw| match BuyerId::parse(raw) {
            Ok(id) => Some(id),
            Err(e) => {
                debug!(error = %e, "Ignoring malformed buyer id header");
                None
            }
        });
        let role = header(BUYER_ROLE_HEADER)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default();

        Self { buyer, role }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether the caller may report payment outcomes.
    #[must_use]
    pub fn is_payment_provider(&self) -> bool {
        matches!(self.role, Role::PaymentProvider | Role::Admin)
    }
}

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Extractor that requires the admin role.
///
/// Non-admin callers receive a `forbidden` envelope.
pub struct RequireAdmin(pub Identity);

/// Extractor for the payment provider callback.
///
/// Accepts the `payment_provider` role and administrators.
pub struct RequirePaymentProvider(pub Identity);

/// Rejection for the role-gated extractors.
pub struct RoleRejection(&'static str);

impl IntoResponse for RoleRejection {
    fn into_response(self) -> Response {
        AppError::Forbidden(self.0.to_owned()).into_response()
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = RoleRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_headers(&parts.headers);
        if identity.is_admin() {
            Ok(Self(identity))
        } else {
            Err(RoleRejection("Administrator access required"))
        }
    }
}

impl<S> FromRequestParts<S> for RequirePaymentProvider
where
    S: Send + Sync,
{
    type Rejection = RoleRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_headers(&parts.headers);
        if identity.is_payment_provider() {
            Ok(Self(identity))
        } else {
            debug!(buyer_id = ?identity.buyer, "Payment callback from unauthorised caller");
            Err(RoleRejection("Payment provider access required"))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_identity_from_headers() {
        let buyer = BuyerId::generate();
        let identity = Identity::from_headers(&headers(&[
            (BUYER_ID_HEADER, &buyer.to_string()),
            (BUYER_ROLE_HEADER, "admin"),
        ]));
        assert_eq!(identity.buyer, Some(buyer));
        assert!(identity.is_admin());
    }

    #[test]
    fn test_malformed_headers_fall_back() {
        let identity = Identity::from_headers(&headers(&[
            (BUYER_ID_HEADER, "not-a-uuid"),
            (BUYER_ROLE_HEADER, "superuser"),
        ]));
        assert_eq!(identity, Identity::default());
    }

    #[test]
    fn test_payment_provider_roles() {
        let provider = Identity::from_headers(&headers(&[(BUYER_ROLE_HEADER, "payment_provider")]));
        assert!(provider.is_payment_provider());
        assert!(!provider.is_admin());

        let admin = Identity::from_headers(&headers(&[(BUYER_ROLE_HEADER, "admin")]));
        assert!(admin.is_payment_provider());

        let buyer = Identity::from_headers(&headers(&[
            (BUYER_ID_HEADER, &BuyerId::generate().to_string()),
            (BUYER_ROLE_HEADER, "buyer"),
        ]));
        assert!(!buyer.is_payment_provider());
    }
}
