// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User records keyed by a local numeric id and unique by identity provider subject.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Role;

use super::super::database::{
    next_id, read_all_desc, read_row, write_row, AccessDatabase, StorageError, StorageResult,
    USERS, USER_EXTERNAL_IDS,
};

/// Persisted user record.
///
/// `has_paid` and `is_whitelisted` are independent: a settled payment sets
/// both, an admin override only touches `is_whitelisted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StoredUser {
    /// Local user id (positive, monotonically assigned).
    pub id: u64,
    /// Identity provider subject (unique).
    pub external_id: String,
    /// Display name from the identity provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Email from the identity provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Authorization role.
    pub role: Role,
    /// Whether the access fee has been settled.
    pub has_paid: bool,
    /// Whether the user may connect to the game server.
    pub is_whitelisted: bool,
    /// In-game handle (at most 16 chars).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_handle: Option<String>,
    /// Free-text greeting (at most 500 chars).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub greeting: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Identity attributes captured on each authenticated request.
#[derive(Debug, Clone)]
pub struct LoginProfile<'a> {
    pub external_id: &'a str,
    pub display_name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub role: Role,
}

/// A single field mutation on a user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserUpdate {
    /// Replace the greeting text.
    Greeting(String),
    /// Replace the in-game handle.
    GameHandle(String),
    /// Payment settled: set `has_paid` and `is_whitelisted`.
    AccessGranted,
    /// Admin override of the whitelist flag only.
    Whitelist(bool),
}

impl StoredUser {
    fn apply(&mut self, update: UserUpdate) {
        match update {
            UserUpdate::Greeting(greeting) => self.greeting = Some(greeting),
            UserUpdate::GameHandle(handle) => self.game_handle = Some(handle),
            UserUpdate::AccessGranted => {
                self.has_paid = true;
                self.is_whitelisted = true;
            }
            UserUpdate::Whitelist(value) => self.is_whitelisted = value,
        }
        self.updated_at = Utc::now();
    }
}

/// Repository for user rows.
pub struct UserRepository<'a> {
    db: &'a AccessDatabase,
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a AccessDatabase) -> Self {
        Self { db }
    }

    /// Create the user on first login, otherwise refresh identity fields and
    /// the last-seen timestamp.
    pub fn upsert_login(&self, profile: &LoginProfile<'_>) -> StorageResult<StoredUser> {
        let now = Utc::now();
        let write_txn = self.db.begin_write()?;
        let user = {
            let mut ids = write_txn.open_table(USER_EXTERNAL_IDS)?;
            let existing_id = ids.get(profile.external_id)?.map(|v| v.value());

            match existing_id {
                Some(id) => {
                    let mut users = write_txn.open_table(USERS)?;
                    let mut user: StoredUser = read_row(&users, id)?.ok_or_else(|| {
                        StorageError::NotFound(format!("User {id} (indexed by subject)"))
                    })?;
                    if let Some(name) = profile.display_name {
                        user.display_name = Some(name.to_string());
                    }
                    if let Some(email) = profile.email {
                        user.email = Some(email.to_string());
                    }
                    user.role = profile.role;
                    user.last_seen_at = now;
                    user.updated_at = now;
                    write_row(&mut users, id, &user)?;
                    user
                }
                None => {
                    let id = next_id(&write_txn, "users")?;
                    let user = StoredUser {
                        id,
                        external_id: profile.external_id.to_string(),
                        display_name: profile.display_name.map(str::to_string),
                        email: profile.email.map(str::to_string),
                        role: profile.role,
                        has_paid: false,
                        is_whitelisted: false,
                        game_handle: None,
                        greeting: None,
                        created_at: now,
                        updated_at: now,
                        last_seen_at: now,
                    };
                    let mut users = write_txn.open_table(USERS)?;
                    write_row(&mut users, id, &user)?;
                    ids.insert(profile.external_id, id)?;
                    user
                }
            }
        };
        write_txn.commit()?;
        Ok(user)
    }

    /// Look up a user by id.
    pub fn find(&self, id: u64) -> StorageResult<Option<StoredUser>> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;
        read_row(&users, id)
    }

    /// Get a user by id, failing with `NotFound` when absent.
    pub fn get(&self, id: u64) -> StorageResult<StoredUser> {
        self.find(id)?
            .ok_or_else(|| StorageError::NotFound(format!("User {id}")))
    }

    /// Look up a user by identity provider subject.
    pub fn find_by_external_id(&self, external_id: &str) -> StorageResult<Option<StoredUser>> {
        let read_txn = self.db.begin_read()?;
        let ids = read_txn.open_table(USER_EXTERNAL_IDS)?;
        let Some(id) = ids.get(external_id)?.map(|v| v.value()) else {
            return Ok(None);
        };
        let users = read_txn.open_table(USERS)?;
        read_row(&users, id)
    }

    /// All users, newest first.
    pub fn list_all(&self) -> StorageResult<Vec<StoredUser>> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(USERS)?;
        read_all_desc(&users)
    }

    /// Apply a single field update and return the updated record.
    pub fn update(&self, id: u64, update: UserUpdate) -> StorageResult<StoredUser> {
        let write_txn = self.db.begin_write()?;
        let user = {
            let mut users = write_txn.open_table(USERS)?;
            let mut user: StoredUser = read_row(&users, id)?
                .ok_or_else(|| StorageError::NotFound(format!("User {id}")))?;
            user.apply(update);
            write_row(&mut users, id, &user)?;
            user
        };
        write_txn.commit()?;
        Ok(user)
    }
}
