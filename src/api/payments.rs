// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Checkout issuance and payment history.

use axum::{
    extract::State,
    http::{header::ORIGIN, HeaderMap},
    Json,
};

use crate::{
    auth::Caller,
    error::ApiError,
    services::payments::{self, CheckoutResponse},
    state::AppState,
    storage::StoredPayment,
};

/// Create a hosted checkout session for the server access fee.
///
/// Redirects go back to the request's `Origin` when it is a valid http(s)
/// origin, otherwise to the configured public origin.
#[utoipa::path(
    post,
    path = "/v1/payments/checkout",
    tag = "Payments",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Checkout session created", body = CheckoutResponse),
        (status = 401, description = "Not authenticated"),
        (status = 502, description = "Payment gateway request failed"),
        (status = 503, description = "Payments not configured")
    )
)]
pub async fn create_checkout(
    State(state): State<AppState>,
    Caller(principal): Caller,
    headers: HeaderMap,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let origin = payments::resolve_origin(
        headers.get(ORIGIN).and_then(|v| v.to_str().ok()),
        &state.public_origin,
    );
    let response = payments::create_checkout(state.gateway.as_ref(), &principal, &origin).await?;
    Ok(Json(response))
}

/// The caller's payments, newest first.
#[utoipa::path(
    get,
    path = "/v1/payments/history",
    tag = "Payments",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Payment history", body = [StoredPayment]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn payment_history(
    State(state): State<AppState>,
    Caller(principal): Caller,
) -> Result<Json<Vec<StoredPayment>>, ApiError> {
    Ok(Json(payments::history(&state.db, &principal)?))
}
