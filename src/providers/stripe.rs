// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Stripe REST client for hosted checkout and charge receipts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use super::gateway::{CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway};
use crate::config::StripeSettings;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const PRODUCT_NAME: &str = "Server Access";

#[derive(Debug, Clone)]
pub struct StripeClient {
    settings: StripeSettings,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChargeResponse {
    #[serde(default)]
    receipt_url: Option<String>,
}

impl StripeClient {
    pub fn new(settings: StripeSettings) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { settings, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.api_base_url.trim_end_matches('/'), path)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> Result<T, GatewayError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Request(format!("{what} returned {status}: {body}")));
        }
        response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(format!("{what} invalid JSON: {e}")))
    }
}

/// Form parameters for `POST /v1/checkout/sessions`.
fn checkout_form(settings: &StripeSettings, request: &CheckoutRequest<'_>) -> Vec<(String, String)> {
    let user_id = request.user_id.to_string();
    let mut form: Vec<(String, String)> = vec![
        ("mode".into(), "payment".into()),
        ("payment_method_types[0]".into(), "card".into()),
        ("line_items[0][quantity]".into(), "1".into()),
        ("success_url".into(), request.success_url()),
        ("cancel_url".into(), request.cancel_url()),
        ("client_reference_id".into(), user_id.clone()),
        ("metadata[user_id]".into(), user_id),
        (
            "metadata[customer_email]".into(),
            request.email.unwrap_or_default().to_string(),
        ),
        (
            "metadata[customer_name]".into(),
            request.display_name.unwrap_or_default().to_string(),
        ),
        ("allow_promotion_codes".into(), "true".into()),
    ];

    match &settings.price_id {
        Some(price_id) => form.push(("line_items[0][price]".into(), price_id.clone())),
        None => {
            form.push((
                "line_items[0][price_data][currency]".into(),
                settings.currency.clone(),
            ));
            form.push((
                "line_items[0][price_data][unit_amount]".into(),
                settings.amount_minor.to_string(),
            ));
            form.push((
                "line_items[0][price_data][product_data][name]".into(),
                PRODUCT_NAME.into(),
            ));
        }
    }

    if let Some(email) = request.email {
        form.push(("customer_email".into(), email.to_string()));
    }
    form
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession, GatewayError> {
        let form = checkout_form(&self.settings, request);
        let response = self
            .http
            .post(self.url("/v1/checkout/sessions"))
            .bearer_auth(&self.settings.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::Request(format!("POST /v1/checkout/sessions failed: {e}")))?;

        let session: SessionResponse =
            Self::read_json(response, "POST /v1/checkout/sessions").await?;
        info!(session_id = %session.id, user_id = request.user_id, "Created checkout session");
        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }

    async fn fetch_receipt_url(&self, charge_id: &str) -> Result<Option<String>, GatewayError> {
        let path = format!("/v1/charges/{charge_id}");
        let response = self
            .http
            .get(self.url(&path))
            .bearer_auth(&self.settings.secret_key)
            .send()
            .await
            .map_err(|e| GatewayError::Request(format!("GET {path} failed: {e}")))?;

        let charge: ChargeResponse = Self::read_json(response, &format!("GET {path}")).await?;
        Ok(charge.receipt_url)
    }
}
