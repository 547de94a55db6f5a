// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payment gateway notification endpoint.
//!
//! The body is taken as raw bytes: the signature covers the exact payload.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::{
    error::ApiError,
    services::reconciliation::{ReconcileError, Reconciler, WebhookOutcome},
    state::AppState,
    webhook::SIGNATURE_HEADER,
};

/// Acknowledgement returned to the gateway.
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: WebhookOutcome,
}

/// Acknowledgement for gateway test events.
#[derive(Debug, Serialize, ToSchema)]
pub struct TestEventAck {
    pub verified: bool,
}

/// Receive a signed payment notification.
///
/// Anything that verifies is acknowledged with 200, including events that are
/// ignored or reference unknown users. Only infrastructure failures return 5xx.
#[utoipa::path(
    post,
    path = "/webhooks/stripe",
    tag = "Webhooks",
    request_body(content = String, description = "Raw notification body", content_type = "application/json"),
    params(("Stripe-Signature" = String, Header, description = "t=<unix>,v1=<hex hmac>")),
    responses(
        (status = 200, description = "Notification processed", body = WebhookAck),
        (status = 400, description = "Signature or payload invalid"),
        (status = 500, description = "Storage failure, gateway will redeliver"),
        (status = 503, description = "Webhook secret not configured")
    )
)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let Some(verifier) = state.webhook.as_ref() else {
        error!("Notification received but no webhook secret is configured");
        return Err(ApiError::service_unavailable("Webhook not configured"));
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let reconciler = Reconciler::new(state.db.clone(), state.gateway.clone());
    match reconciler.handle(verifier, signature, &body).await {
        Ok(WebhookOutcome::TestEvent) => {
            Ok((StatusCode::OK, Json(TestEventAck { verified: true })).into_response())
        }
        Ok(outcome) => Ok((
            StatusCode::OK,
            Json(WebhookAck {
                received: true,
                outcome,
            }),
        )
            .into_response()),
        Err(ReconcileError::Signature(err)) => {
            warn!(error = %err, "Rejected notification with invalid signature");
            Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "invalid_signature",
                format!("Webhook Error: {err}"),
            ))
        }
        Err(ReconcileError::Payload(err)) => {
            warn!(error = %err, "Rejected notification with invalid payload");
            Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "invalid_payload",
                format!("Webhook Error: {err}"),
            ))
        }
        Err(ReconcileError::Storage(err)) => Err(ApiError::internal(err)),
    }
}
