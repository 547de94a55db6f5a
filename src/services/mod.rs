// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Domain operations behind the HTTP handlers.
//!
//! Every operation on user data takes the resolved
//! [`Principal`](crate::auth::Principal) and checks its tier before reading or
//! writing anything.

pub mod applications;
pub mod gallery;
pub mod payments;
pub mod reconciliation;
pub mod server_status;
pub mod users;
pub mod whitelist;

use crate::auth::AuthError;
use crate::providers::{ChatSourceError, GatewayError, ObjectStoreError};
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Malformed or out-of-range input.
    #[error("{0}")]
    Validation(String),

    /// A business rule refused the operation.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    ObjectStore(#[from] ObjectStoreError),

    #[error(transparent)]
    ChatSource(#[from] ChatSourceError),

    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => ServiceError::NotFound(format!("{what} not found")),
            other => ServiceError::Storage(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Check that `value` holds between `min` and `max` characters.
pub(crate) fn check_length(field: &str, value: &str, min: usize, max: usize) -> ServiceResult<()> {
    let len = value.chars().count();
    if len < min {
        return Err(ServiceError::Validation(if min == 1 {
            format!("{field} must not be empty")
        } else {
            format!("{field} must be at least {min} characters")
        }));
    }
    if len > max {
        return Err(ServiceError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// Trim an optional text field, mapping blank input to `None`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
