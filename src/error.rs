// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::auth::AuthError;
use crate::providers::{ChatSourceError, GatewayError};
use crate::services::ServiceError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: &'static str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "conflict", message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", message)
    }

    /// Opaque 500. Details go to the log, not the client.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        error!(error = %detail, "Internal error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal server error",
        )
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = err.status_code();
        if status.is_server_error() {
            error!(error = %err, "Authentication failure");
        }
        Self::new(status, err.error_code(), err.to_string())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Auth(auth) => auth.into(),
            ServiceError::Validation(message) => Self::bad_request(message),
            ServiceError::Conflict(message) => Self::conflict(message),
            ServiceError::NotFound(message) => Self::not_found(message),
            ServiceError::Gateway(GatewayError::NotConfigured) => {
                Self::service_unavailable("Payments are not available")
            }
            ServiceError::Gateway(err) => {
                error!(error = %err, "Payment gateway failure");
                Self::new(
                    StatusCode::BAD_GATEWAY,
                    "gateway_error",
                    "Payment gateway request failed",
                )
            }
            ServiceError::ChatSource(ChatSourceError::NotConfigured) => {
                Self::service_unavailable("Chat import is not configured")
            }
            ServiceError::ChatSource(err) => {
                error!(error = %err, "Chat platform failure");
                Self::new(
                    StatusCode::BAD_GATEWAY,
                    "chat_source_error",
                    "Chat platform request failed",
                )
            }
            ServiceError::ObjectStore(err) => Self::internal(err),
            ServiceError::Storage(err) => Self::internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.code,
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use axum::body::to_bytes;

    #[test]
    fn service_errors_map_to_stable_codes() {
        let cases = [
            (
                ServiceError::Validation("bad".into()),
                StatusCode::BAD_REQUEST,
                "validation_error",
            ),
            (
                ServiceError::Conflict("dup".into()),
                StatusCode::CONFLICT,
                "conflict",
            ),
            (
                ServiceError::NotFound("gone".into()),
                StatusCode::NOT_FOUND,
                "not_found",
            ),
            (
                ServiceError::Auth(AuthError::Unauthenticated),
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
            ),
            (
                ServiceError::Auth(AuthError::AdminRequired),
                StatusCode::FORBIDDEN,
                "admin_required",
            ),
            (
                ServiceError::Gateway(GatewayError::NotConfigured),
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
            ),
            (
                ServiceError::Storage(StorageError::IntegrityViolation("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
            ),
        ];

        for (err, status, code) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status, status);
            assert_eq!(api.code, code);
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let api: ApiError =
            ServiceError::Storage(StorageError::NotFound("secret path".into())).into();
        assert_eq!(api.message, "Internal server error");
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data","error_code":"validation_error"}"#);
    }
}
