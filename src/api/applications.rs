// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Whitelist application endpoints for players.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::Caller,
    error::ApiError,
    services::applications::{self, SubmitApplicationRequest},
    state::AppState,
    storage::StoredApplication,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct ApplicationResponse {
    pub success: bool,
    pub application: StoredApplication,
}

/// Submit a whitelist application.
///
/// A player may hold one pending application at a time.
#[utoipa::path(
    post,
    path = "/v1/applications",
    tag = "Applications",
    security(("bearer_auth" = [])),
    request_body = SubmitApplicationRequest,
    responses(
        (status = 201, description = "Application submitted", body = ApplicationResponse),
        (status = 400, description = "Field length out of range"),
        (status = 401, description = "Not authenticated"),
        (status = 409, description = "A pending application already exists")
    )
)]
pub async fn submit_application(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Json(request): Json<SubmitApplicationRequest>,
) -> Result<(StatusCode, Json<ApplicationResponse>), ApiError> {
    let application = applications::submit(&state.db, &principal, request)?;
    Ok((
        StatusCode::CREATED,
        Json(ApplicationResponse {
            success: true,
            application,
        }),
    ))
}

/// The caller's most recent application, or `null`.
#[utoipa::path(
    get,
    path = "/v1/applications/me",
    tag = "Applications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Latest application, or null if none", body = StoredApplication),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_my_application(
    State(state): State<AppState>,
    Caller(principal): Caller,
) -> Result<Json<Option<StoredApplication>>, ApiError> {
    Ok(Json(applications::get_mine(&state.db, &principal)?))
}
