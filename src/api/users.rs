// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Profile endpoints.

use axum::{extract::State, Json};

use crate::{
    auth::Caller,
    error::ApiError,
    services::users::{self, UpdateGameHandleRequest, UpdateGreetingRequest},
    state::AppState,
    storage::StoredUser,
};

/// Get the caller's profile.
///
/// The record is created on first login.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User profile", body = StoredUser),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_current_user(Caller(principal): Caller) -> Result<Json<StoredUser>, ApiError> {
    Ok(Json(users::profile(&principal)?))
}

#[utoipa::path(
    put,
    path = "/v1/users/me/greeting",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = UpdateGreetingRequest,
    responses(
        (status = 200, description = "Updated profile", body = StoredUser),
        (status = 400, description = "Greeting empty or longer than 500 characters"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn update_greeting(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Json(request): Json<UpdateGreetingRequest>,
) -> Result<Json<StoredUser>, ApiError> {
    let user = users::update_greeting(&state.db, &principal, &request.greeting)?;
    Ok(Json(user))
}

#[utoipa::path(
    put,
    path = "/v1/users/me/game-handle",
    tag = "Users",
    security(("bearer_auth" = [])),
    request_body = UpdateGameHandleRequest,
    responses(
        (status = 200, description = "Updated profile", body = StoredUser),
        (status = 400, description = "Handle shorter than 3 or longer than 16 characters"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn update_game_handle(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Json(request): Json<UpdateGameHandleRequest>,
) -> Result<Json<StoredUser>, ApiError> {
    let user = users::update_game_handle(&state.db, &principal, &request.game_handle)?;
    Ok(Json(user))
}
