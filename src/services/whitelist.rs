// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin override of the whitelist flag.

use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

use crate::auth::Principal;
use crate::storage::{AccessDatabase, StoredUser, UserRepository, UserUpdate};

use super::ServiceResult;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ToggleWhitelistRequest {
    pub is_whitelisted: bool,
}

/// Set a user's whitelist flag. Payment state is left untouched.
pub fn toggle(
    db: &AccessDatabase,
    principal: &Principal,
    user_id: u64,
    desired: bool,
) -> ServiceResult<StoredUser> {
    let admin = principal.require_admin()?;
    let user = UserRepository::new(db).update(user_id, UserUpdate::Whitelist(desired))?;
    info!(
        user_id,
        admin_id = admin.id,
        is_whitelisted = desired,
        "Whitelist overridden"
    );
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthError, Role};
    use crate::services::ServiceError;
    use crate::storage::database::temp_db;
    use crate::storage::LoginProfile;

    fn login(db: &AccessDatabase, subject: &str, role: Role) -> Principal {
        Principal::from_user(
            UserRepository::new(db)
                .upsert_login(&LoginProfile {
                    external_id: subject,
                    display_name: None,
                    email: None,
                    role,
                })
                .unwrap(),
        )
    }

    #[test]
    fn toggle_sets_whitelist_without_payment() {
        let (db, _dir) = temp_db();
        let user = login(&db, "player", Role::User);
        let admin = login(&db, "admin", Role::Admin);
        let user_id = user.user().unwrap().id;

        let updated = toggle(&db, &admin, user_id, true).unwrap();
        assert!(updated.is_whitelisted);
        assert!(!updated.has_paid);

        let updated = toggle(&db, &admin, user_id, false).unwrap();
        assert!(!updated.is_whitelisted);
    }

    #[test]
    fn member_toggle_is_refused_and_changes_nothing() {
        let (db, _dir) = temp_db();
        let user = login(&db, "player", Role::User);
        let user_id = user.user().unwrap().id;

        let err = toggle(&db, &user, user_id, true).unwrap_err();
        assert!(matches!(err, ServiceError::Auth(AuthError::AdminRequired)));
        assert!(!UserRepository::new(&db).get(user_id).unwrap().is_whitelisted);
    }

    #[test]
    fn unknown_user_is_not_found() {
        let (db, _dir) = temp_db();
        let admin = login(&db, "admin", Role::Admin);
        assert!(matches!(
            toggle(&db, &admin, 99, true),
            Err(ServiceError::NotFound(_))
        ));
    }
}
