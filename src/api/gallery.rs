// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Community gallery endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::Caller,
    error::ApiError,
    services::gallery::{self, GalleryImageView, UploadImageRequest, UploadImageResponse},
    state::AppState,
    storage::StoredGalleryImage,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteImageResponse {
    pub success: bool,
}

/// All gallery images with uploader names. Public.
#[utoipa::path(
    get,
    path = "/v1/gallery",
    tag = "Gallery",
    responses((status = 200, description = "Gallery images, newest first", body = [GalleryImageView]))
)]
pub async fn list_gallery(
    State(state): State<AppState>,
) -> Result<Json<Vec<GalleryImageView>>, ApiError> {
    Ok(Json(gallery::list_public(&state.db)?))
}

#[utoipa::path(
    get,
    path = "/v1/gallery/mine",
    tag = "Gallery",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's images", body = [StoredGalleryImage]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn my_gallery(
    State(state): State<AppState>,
    Caller(principal): Caller,
) -> Result<Json<Vec<StoredGalleryImage>>, ApiError> {
    Ok(Json(gallery::mine(&state.db, &principal)?))
}

/// Upload a base64-encoded image (JPEG, PNG, WebP or GIF, at most 10 MiB).
#[utoipa::path(
    post,
    path = "/v1/gallery",
    tag = "Gallery",
    security(("bearer_auth" = [])),
    request_body = UploadImageRequest,
    responses(
        (status = 201, description = "Image stored", body = UploadImageResponse),
        (status = 400, description = "Invalid image"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn upload_image(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Json(request): Json<UploadImageRequest>,
) -> Result<(StatusCode, Json<UploadImageResponse>), ApiError> {
    let response = gallery::upload(&state.db, state.objects.as_ref(), &principal, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    delete,
    path = "/v1/gallery/{image_id}",
    tag = "Gallery",
    security(("bearer_auth" = [])),
    params(("image_id" = u64, Path, description = "Image to delete")),
    responses(
        (status = 200, description = "Image deleted", body = DeleteImageResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No such image owned by the caller")
    )
)]
pub async fn delete_image(
    State(state): State<AppState>,
    Caller(principal): Caller,
    Path(image_id): Path<u64>,
) -> Result<Json<DeleteImageResponse>, ApiError> {
    gallery::delete(&state.db, state.objects.as_ref(), &principal, image_id).await?;
    Ok(Json(DeleteImageResponse { success: true }))
}
