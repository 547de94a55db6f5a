// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! This module resolves the request principal from an identity provider JWT.
//!
//! ## Auth Flow
//!
//! 1. Frontend authenticates the player with the identity provider
//! 2. Frontend sends `Authorization: Bearer <JWT>`
//! 3. Server:
//!    - Fetches the provider JWKS via HTTPS
//!    - Verifies JWT signature, expiry, issuer, audience
//!    - Extracts `sub`, profile claims and `publicMetadata.role`
//!    - Upserts the local user row and wraps it in a [`Principal`]
//!
//! ## Security
//!
//! - Every service operation calls [`Principal::require`] before side effects
//! - JWKS is cached with TTL
//! - Clock skew tolerance is 60 seconds

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod principal;
pub mod roles;

pub use claims::{AuthenticatedUser, IdentityClaims};
pub use error::AuthError;
pub use extractor::Caller;
pub use jwks::JwksManager;
pub use principal::{Principal, Tier};
pub use roles::Role;
