// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payment gateway boundary used by checkout issuance and reconciliation.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("payment gateway is not configured")]
    NotConfigured,

    #[error("payment gateway request failed: {0}")]
    Request(String),

    #[error("payment gateway response was invalid: {0}")]
    InvalidResponse(String),
}

/// Parameters for a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    /// Local user id, embedded in metadata and the client reference.
    pub user_id: u64,
    pub email: Option<&'a str>,
    pub display_name: Option<&'a str>,
    /// Origin used to build the success and cancel redirects.
    pub origin: &'a str,
}

impl CheckoutRequest<'_> {
    pub fn success_url(&self) -> String {
        format!(
            "{}/payment/success?session_id={{CHECKOUT_SESSION_ID}}",
            self.origin.trim_end_matches('/')
        )
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/payment/cancel", self.origin.trim_end_matches('/'))
    }
}

/// A created hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    /// Redirect URL. The gateway may omit it.
    pub url: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session for the single access line item.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Look up the receipt URL of a charge.
    async fn fetch_receipt_url(&self, charge_id: &str) -> Result<Option<String>, GatewayError>;
}

/// Stand-in used when no gateway secret key is configured.
pub struct UnconfiguredGateway;

#[async_trait]
impl PaymentGateway for UnconfiguredGateway {
    async fn create_checkout_session(
        &self,
        _request: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession, GatewayError> {
        Err(GatewayError::NotConfigured)
    }

    async fn fetch_receipt_url(&self, _charge_id: &str) -> Result<Option<String>, GatewayError> {
        Err(GatewayError::NotConfigured)
    }
}
