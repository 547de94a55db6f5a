// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Profile reads and updates.

use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::Principal;
use crate::storage::{AccessDatabase, StoredUser, UserRepository, UserUpdate};

use super::applications::{HANDLE_MAX, HANDLE_MIN};
use super::{check_length, ServiceResult};

pub const GREETING_MAX: usize = 500;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateGreetingRequest {
    pub greeting: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateGameHandleRequest {
    pub game_handle: String,
}

/// The caller's own record.
pub fn profile(principal: &Principal) -> ServiceResult<StoredUser> {
    Ok(principal.require_user()?.clone())
}

pub fn update_greeting(
    db: &AccessDatabase,
    principal: &Principal,
    greeting: &str,
) -> ServiceResult<StoredUser> {
    let user = principal.require_user()?;
    let greeting = greeting.trim();
    check_length("Greeting", greeting, 1, GREETING_MAX)?;
    Ok(UserRepository::new(db).update(user.id, UserUpdate::Greeting(greeting.to_string()))?)
}

pub fn update_game_handle(
    db: &AccessDatabase,
    principal: &Principal,
    handle: &str,
) -> ServiceResult<StoredUser> {
    let user = principal.require_user()?;
    let handle = handle.trim();
    check_length("Game handle", handle, HANDLE_MIN, HANDLE_MAX)?;
    Ok(UserRepository::new(db).update(user.id, UserUpdate::GameHandle(handle.to_string()))?)
}

/// All users, newest first. Admin only.
pub fn list_users(db: &AccessDatabase, principal: &Principal) -> ServiceResult<Vec<StoredUser>> {
    principal.require_admin()?;
    Ok(UserRepository::new(db).list_all()?)
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
                    display_name: Some("Steve"),
                    email: None,
                    role,
                })
                .unwrap(),
        )
    }

    #[test]
    fn greeting_and_handle_are_validated_and_stored() {
        let (db, _dir) = temp_db();
        let user = login(&db, "player", Role::User);

        let updated = update_greeting(&db, &user, "  hello world ").unwrap();
        assert_eq!(updated.greeting.as_deref(), Some("hello world"));
        assert!(matches!(
            update_greeting(&db, &user, "   "),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            update_greeting(&db, &user, &"g".repeat(GREETING_MAX + 1)),
            Err(ServiceError::Validation(_))
        ));

        let updated = update_game_handle(&db, &user, "Notch").unwrap();
        assert_eq!(updated.game_handle.as_deref(), Some("Notch"));
        assert!(matches!(
            update_game_handle(&db, &user, "this_handle_is_too_long"),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn profile_requires_login() {
        assert!(matches!(
            profile(&Principal::Anonymous),
            Err(ServiceError::Auth(AuthError::Unauthenticated))
        ));
    }

    #[test]
    fn list_users_is_admin_only() {
        let (db, _dir) = temp_db();
        let user = login(&db, "player", Role::User);
        let admin = login(&db, "admin", Role::Admin);

        assert!(matches!(
            list_users(&db, &user),
            Err(ServiceError::Auth(AuthError::AdminRequired))
        ));
        assert_eq!(list_users(&db, &admin).unwrap().len(), 2);
    }
}
