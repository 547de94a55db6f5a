// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Checkout issuance and payment history.
//!
//! Issuing a checkout does not write a payment row. The row appears when the
//! gateway notifies a completed session.

use serde::Serialize;
use tracing::{info, warn};
use url::Url;
use utoipa::ToSchema;

use crate::auth::Principal;
use crate::providers::{CheckoutRequest, PaymentGateway};
use crate::storage::{AccessDatabase, PaymentRepository, StoredPayment};

use super::ServiceResult;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutResponse {
    /// Hosted checkout redirect URL.
    pub url: Option<String>,
}

/// Request a hosted checkout session for the caller.
pub async fn create_checkout(
    gateway: &dyn PaymentGateway,
    principal: &Principal,
    origin: &str,
) -> ServiceResult<CheckoutResponse> {
    let user = principal.require_user()?;

    let request = CheckoutRequest {
        user_id: user.id,
        email: user.email.as_deref(),
        display_name: user.display_name.as_deref(),
        origin,
    };
    let session = gateway.create_checkout_session(&request).await?;

    info!(
        user_id = user.id,
        session_id = %session.id,
        "Checkout session created"
    );
    Ok(CheckoutResponse { url: session.url })
}

/// The caller's payments, newest first.
pub fn history(db: &AccessDatabase, principal: &Principal) -> ServiceResult<Vec<StoredPayment>> {
    let user = principal.require_user()?;
    Ok(PaymentRepository::new(db).list_for_user(user.id)?)
}

/// Pick the redirect origin: the request's `Origin` header when it is a
/// valid http(s) origin, otherwise the configured public origin.
pub fn resolve_origin(header: Option<&str>, fallback: &str) -> String {
    let Some(raw) = header else {
        return fallback.to_string();
    };
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {
            url.origin().ascii_serialization()
        }
        _ => {
            warn!(origin = raw, "Ignoring invalid Origin header");
            fallback.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::principal::test_user;
    use crate::auth::{AuthError, Role};
    use crate::providers::gateway::fake::FakeGateway;
    use crate::providers::{GatewayError, UnconfiguredGateway};
    use crate::services::ServiceError;

    #[tokio::test]
    async fn checkout_embeds_user_and_returns_url() {
        let gateway = FakeGateway::default();
        let principal = Principal::from_user(test_user(7, Role::User));

        let response = create_checkout(&gateway, &principal, "https://play.example.com")
            .await
            .unwrap();

        assert_eq!(
            response.url.as_deref(),
            Some("https://checkout.example.com/pay/cs_fake_1")
        );
        let checkouts = gateway.checkouts.lock().unwrap();
        assert_eq!(checkouts.len(), 1);
        assert_eq!(checkouts[0].0, 7);
        assert!(checkouts[0].1.starts_with("https://play.example.com/payment/success"));
    }

    #[tokio::test]
    async fn anonymous_checkout_never_reaches_gateway() {
        let gateway = FakeGateway::default();
        let err = create_checkout(&gateway, &Principal::Anonymous, "http://localhost:3000")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Auth(AuthError::Unauthenticated)));
        assert!(gateway.checkouts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unconfigured_gateway_surfaces_gateway_error() {
        let principal = Principal::from_user(test_user(1, Role::User));
        let err = create_checkout(&UnconfiguredGateway, &principal, "http://localhost:3000")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Gateway(GatewayError::NotConfigured)));
    }

    #[test]
    fn origin_header_is_validated() {
        let fallback = "http://localhost:3000";
        assert_eq!(resolve_origin(None, fallback), fallback);
        assert_eq!(
            resolve_origin(Some("https://play.example.com"), fallback),
            "https://play.example.com"
        );
        assert_eq!(
            resolve_origin(Some("https://play.example.com:8443/path"), fallback),
            "https://play.example.com:8443"
        );
        assert_eq!(resolve_origin(Some("null"), fallback), fallback);
        assert_eq!(resolve_origin(Some("javascript:alert(1)"), fallback), fallback);
    }
}
