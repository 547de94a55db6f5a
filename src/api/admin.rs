// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints.
//!
//! These endpoints require the admin tier and provide:
//! - Application review
//! - User overview and whitelist override
//! - Chat screenshot import into the gallery

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::Caller,
    error::ApiError,
    services::{
        applications::{self, ApplicationWithApplicant, ReviewApplicationRequest},
        gallery::{self, ImportRequest, ImportSummary},
        users, whitelist,
        whitelist::ToggleWhitelistRequest,
    },
    state::AppState,
    storage::{StoredApplication, StoredUser},
};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for the application list.
#[derive(Debug, Deserialize, IntoParams)]
pub struct ApplicationListQuery {
    /// `pending` to list only applications awaiting review.
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewResponse {
    pub success: bool,
    pub application: StoredApplication,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WhitelistResponse {
    pub success: bool,
    pub user: StoredUser,
}

/// Response for the admin user list.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminUserListResponse {
    pub users: Vec<StoredUser>,
    pub total: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// List whitelist applications with applicant details.
#[utoipa::path(
    get,
    path = "/v1/admin/applications",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(ApplicationListQuery),
    responses(
        (status = 200, description = "Applications, newest first", body = [ApplicationWithApplicant]),
        (status = 400, description = "Unknown status filter"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn list_applications(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Query(query): Query<ApplicationListQuery>,
) -> Result<Json<Vec<ApplicationWithApplicant>>, ApiError> {
    let listed = match query.status.as_deref() {
        None | Some("all") => applications::list_all(&state.db, &principal)?,
        Some("pending") => applications::list_pending(&state.db, &principal)?,
        Some(other) => {
            principal.require_admin()?;
            return Err(ApiError::bad_request(format!(
                "Unknown status filter '{other}'"
            )));
        }
    };
    Ok(Json(listed))
}

/// Approve or reject a pending application.
///
/// Approved and rejected applications cannot be reviewed again.
#[utoipa::path(
    post,
    path = "/v1/admin/applications/{application_id}/review",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("application_id" = u64, Path, description = "Application to review")),
    request_body = ReviewApplicationRequest,
    responses(
        (status = 200, description = "Application reviewed", body = ReviewResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 404, description = "Application not found"),
        (status = 409, description = "Application already reviewed")
    )
)]
pub async fn review_application(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(application_id): Path<u64>,
    Json(request): Json<ReviewApplicationRequest>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let application = applications::review(&state.db, &principal, application_id, request)?;
    Ok(Json(ReviewResponse {
        success: true,
        application,
    }))
}

/// List all users, newest first.
#[utoipa::path(
    get,
    path = "/v1/admin/users",
    tag = "Admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All users", body = AdminUserListResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    Caller(principal): Caller,
) -> Result<Json<AdminUserListResponse>, ApiError> {
    let users = users::list_users(&state.db, &principal)?;
    let total = users.len();
    Ok(Json(AdminUserListResponse { users, total }))
}

/// Set a user's whitelist flag directly.
///
/// Payment state is not changed.
#[utoipa::path(
    put,
    path = "/v1/admin/users/{user_id}/whitelist",
    tag = "Admin",
    security(("bearer_auth" = [])),
    params(("user_id" = u64, Path, description = "Target user")),
    request_body = ToggleWhitelistRequest,
    responses(
        (status = 200, description = "Whitelist updated", body = WhitelistResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 404, description = "User not found")
    )
)]
pub async fn set_whitelist(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(user_id): Path<u64>,
    Json(request): Json<ToggleWhitelistRequest>,
) -> Result<Json<WhitelistResponse>, ApiError> {
    let user = whitelist::toggle(&state.db, &principal, user_id, request.is_whitelisted)?;
    Ok(Json(WhitelistResponse {
        success: true,
        user,
    }))
}

/// Import screenshots from the configured chat channel into the gallery.
#[utoipa::path(
    post,
    path = "/v1/admin/gallery/import",
    tag = "Admin",
    security(("bearer_auth" = [])),
    request_body = ImportRequest,
    responses(
        (status = 200, description = "Import summary", body = ImportSummary),
        (status = 400, description = "Limit out of range"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (admin required)"),
        (status = 503, description = "Chat import not configured")
    )
)]
pub async fn import_gallery(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Json(request): Json<ImportRequest>,
) -> Result<Json<ImportSummary>, ApiError> {
    let summary = gallery::import_from_chat(
        &state.db,
        state.objects.as_ref(),
        state.chat_source.as_deref(),
        &principal,
        request.limit,
    )
    .await?;
    Ok(Json(summary))
}
