// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Claims read from an identity provider JWT.
///
/// Only `sub` is required. Profile claims are optional and refresh the
/// stored user on each request when present.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityClaims {
    /// Subject (stable external user key)
    pub sub: String,

    /// Expiration timestamp
    #[serde(default)]
    pub exp: i64,

    /// Issuer
    #[serde(default)]
    pub iss: String,

    /// Session ID
    #[serde(default)]
    pub sid: Option<String>,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Primary email address
    #[serde(default)]
    pub email: Option<String>,

    /// Provider public metadata carrying the role
    #[serde(default, rename = "publicMetadata")]
    pub public_metadata: Option<PublicMetadata>,
}

/// Identity provider public metadata.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PublicMetadata {
    /// User's role (set in the provider dashboard)
    #[serde(default)]
    pub role: Option<String>,
}

/// Authenticated user information extracted from JWT.
///
/// This is the verified identity. The local [`StoredUser`] row is resolved
/// from it by the `Caller` extractor.
///
/// [`StoredUser`]: crate::storage::StoredUser
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// External user key (`sub` claim)
    pub subject: String,

    /// Role asserted by the token (before `ADMIN_SUBJECTS` elevation)
    pub role: Role,

    /// Session ID (if available)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Token expiration (Unix timestamp, not serialized)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    /// Create from verified claims. Unknown or missing roles default to `User`.
    pub fn from_claims(claims: IdentityClaims) -> Self {
        let role = claims
            .public_metadata
            .as_ref()
            .and_then(|m| m.role.as_deref())
            .and_then(Role::parse)
            .unwrap_or_default();

        Self {
            subject: claims.sub,
            role,
            session_id: claims.sid,
            display_name: claims.name.filter(|n| !n.trim().is_empty()),
            email: claims.email.filter(|e| !e.trim().is_empty()),
            expires_at: claims.exp,
        }
    }

    /// Check if the token asserts the admin role.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
