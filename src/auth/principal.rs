// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Resolved principal and the tier gate every service operation calls first.

use crate::storage::StoredUser;

use super::{AuthError, Role};

/// Minimum tier an operation requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Public,
    User,
    Admin,
}

/// The identity attached to a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Principal {
    /// No credentials were presented.
    Anonymous,
    /// Authenticated regular user.
    Member(StoredUser),
    /// Authenticated admin.
    Admin(StoredUser),
}

impl Principal {
    /// Wrap a stored user according to its role.
    pub fn from_user(user: StoredUser) -> Self {
        match user.role {
            Role::Admin => Principal::Admin(user),
            Role::User => Principal::Member(user),
        }
    }

    /// The stored user behind an authenticated principal.
    pub fn user(&self) -> Option<&StoredUser> {
        match self {
            Principal::Anonymous => None,
            Principal::Member(user) | Principal::Admin(user) => Some(user),
        }
    }

    /// Fail unless the principal meets `tier`.
    ///
    /// # Errors
    /// `Unauthenticated` for anonymous callers of user/admin operations,
    /// `AdminRequired` for members calling admin operations.
    pub fn require(&self, tier: Tier) -> Result<(), AuthError> {
        match (tier, self) {
            (Tier::Public, _) => Ok(()),
            (_, Principal::Anonymous) => Err(AuthError::Unauthenticated),
            (Tier::User, _) => Ok(()),
            (Tier::Admin, Principal::Admin(_)) => Ok(()),
            (Tier::Admin, Principal::Member(_)) => Err(AuthError::AdminRequired),
        }
    }

    /// Require the user tier and return the caller's record.
    pub fn require_user(&self) -> Result<&StoredUser, AuthError> {
        self.require(Tier::User)?;
        self.user().ok_or(AuthError::Unauthenticated)
    }

    /// Require the admin tier and return the admin's record.
    pub fn require_admin(&self) -> Result<&StoredUser, AuthError> {
        self.require(Tier::Admin)?;
        self.user().ok_or(AuthError::Unauthenticated)
    }
}

#[cfg(test)]
pub(crate) fn test_user(id: u64, role: Role) -> StoredUser {
    let now = chrono::Utc::now();
    StoredUser {
        id,
        external_id: format!("user_{id}"),
        display_name: Some(format!("Player {id}")),
        email: None,
        role,
        has_paid: false,
        is_whitelisted: false,
        game_handle: None,
        greeting: None,
        created_at: now,
        updated_at: now,
        last_seen_at: now,
    }
}
