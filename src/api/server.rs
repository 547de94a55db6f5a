// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Game server status endpoint.

use axum::{extract::State, Json};

use crate::{providers::ServerStatus, services::server_status, state::AppState};

/// Live game server status. Public; reports offline when the lookup fails.
#[utoipa::path(
    get,
    path = "/v1/server/status",
    tag = "Server",
    responses((status = 200, description = "Current server status", body = ServerStatus))
)]
pub async fn get_server_status(State(state): State<AppState>) -> Json<ServerStatus> {
    Json(server_status::current(state.server_status.as_deref()).await)
}
