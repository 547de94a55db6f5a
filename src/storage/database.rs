// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded access database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized StoredUser
//! - `user_external_ids`: identity provider subject → user_id (unique)
//! - `applications`: application_id → serialized StoredApplication
//! - `user_applications`: composite key (user_id|application_id) → application_id
//! - `pending_applications`: user_id → application_id (at most one per user)
//! - `payments`: payment_id → serialized StoredPayment
//! - `payment_sessions`: checkout session id → payment_id (unique)
//! - `payment_intents`: payment intent id → payment_id (unique)
//! - `parked_intent_outcomes`: payment intent id → serialized IntentOutcome
//! - `gallery_images`: image_id → serialized StoredGalleryImage
//! - `gallery_sources`: chat attachment key → image_id (unique)
//! - `sequences`: entity name → last issued id
//!
//! redb allows a single write transaction at a time. Every check-then-write
//! on a unique index happens inside one write transaction.

use std::path::Path;

use redb::{
    Database, ReadableDatabase, ReadableTable, Table, TableDefinition, WriteTransaction,
};
use serde::{de::DeserializeOwned, Serialize};

// =============================================================================
// Table Definitions
// =============================================================================

pub(crate) const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");

pub(crate) const USER_EXTERNAL_IDS: TableDefinition<&str, u64> =
    TableDefinition::new("user_external_ids");

pub(crate) const APPLICATIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("applications");

/// Key format: `user_id_be | application_id_be` so a prefix scan yields a
/// user's applications oldest-first.
pub(crate) const USER_APPLICATIONS: TableDefinition<&[u8], u64> =
    TableDefinition::new("user_applications");

pub(crate) const PENDING_APPLICATIONS: TableDefinition<u64, u64> =
    TableDefinition::new("pending_applications");

pub(crate) const PAYMENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("payments");

pub(crate) const PAYMENT_SESSIONS: TableDefinition<&str, u64> =
    TableDefinition::new("payment_sessions");

pub(crate) const PAYMENT_INTENTS: TableDefinition<&str, u64> =
    TableDefinition::new("payment_intents");

pub(crate) const PARKED_INTENT_OUTCOMES: TableDefinition<&str, &[u8]> =
    TableDefinition::new("parked_intent_outcomes");

pub(crate) const GALLERY_IMAGES: TableDefinition<u64, &[u8]> =
    TableDefinition::new("gallery_images");

pub(crate) const GALLERY_SOURCES: TableDefinition<&str, u64> =
    TableDefinition::new("gallery_sources");

const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    /// A unique index already holds the key being inserted.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// AccessDatabase
// =============================================================================

/// Embedded ACID database holding users, applications, payments and gallery rows.
pub struct AccessDatabase {
    db: Database,
}

impl AccessDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USER_EXTERNAL_IDS)?;
            let _ = write_txn.open_table(APPLICATIONS)?;
            let _ = write_txn.open_table(USER_APPLICATIONS)?;
            let _ = write_txn.open_table(PENDING_APPLICATIONS)?;
            let _ = write_txn.open_table(PAYMENTS)?;
            let _ = write_txn.open_table(PAYMENT_SESSIONS)?;
            let _ = write_txn.open_table(PAYMENT_INTENTS)?;
            let _ = write_txn.open_table(PARKED_INTENT_OUTCOMES)?;
            let _ = write_txn.open_table(GALLERY_IMAGES)?;
            let _ = write_txn.open_table(GALLERY_SOURCES)?;
            let _ = write_txn.open_table(SEQUENCES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    pub(crate) fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    pub(crate) fn begin_read(&self) -> StorageResult<redb::ReadTransaction> {
        Ok(self.db.begin_read()?)
    }

    /// Cheap read used by the readiness endpoint.
    pub fn health_check(&self) -> StorageResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(SEQUENCES)?;
        Ok(())
    }
}

// =============================================================================
// Row Helpers
// =============================================================================

/// Issue the next id for an entity sequence. Ids start at 1.
pub(crate) fn next_id(txn: &WriteTransaction, sequence: &str) -> StorageResult<u64> {
    let mut table = txn.open_table(SEQUENCES)?;
    let current = table.get(sequence)?.map(|v| v.value()).unwrap_or(0);
    let next = current + 1;
    table.insert(sequence, next)?;
    Ok(next)
}

/// Read and deserialize a JSON row by primary key.
pub(crate) fn read_row<T, Tbl>(table: &Tbl, id: u64) -> StorageResult<Option<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<u64, &'static [u8]>,
{
    match table.get(id)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

/// Serialize and store a JSON row under its primary key.
pub(crate) fn write_row<T: Serialize>(
    table: &mut Table<'_, u64, &'static [u8]>,
    id: u64,
    row: &T,
) -> StorageResult<()> {
    let json = serde_json::to_vec(row)?;
    table.insert(id, json.as_slice())?;
    Ok(())
}

/// Deserialize every row of a primary table, newest (highest id) first.
pub(crate) fn read_all_desc<T, Tbl>(table: &Tbl) -> StorageResult<Vec<T>>
where
    T: DeserializeOwned,
    Tbl: ReadableTable<u64, &'static [u8]>,
{
    let mut rows = Vec::new();
    for entry in table.iter()?.rev() {
        let (_, value) = entry?;
        rows.push(serde_json::from_slice(value.value())?);
    }
    Ok(rows)
}

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build a composite `owner_id | child_id` key (both big-endian) so that a
/// prefix scan returns an owner's children in id order.
pub(crate) fn make_child_key(owner_id: u64, child_id: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&owner_id.to_be_bytes());
    key[8..].copy_from_slice(&child_id.to_be_bytes());
    key
}

/// Inclusive bounds covering every child key of `owner_id`.
pub(crate) fn child_key_bounds(owner_id: u64) -> ([u8; 16], [u8; 16]) {
    (make_child_key(owner_id, 0), make_child_key(owner_id, u64::MAX))
}

#[cfg(test)]
pub(crate) fn temp_db() -> (AccessDatabase, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = AccessDatabase::open(&dir.path().join("test.redb")).unwrap();
    (db, dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequences_are_independent_and_start_at_one() {
        let (db, _dir) = temp_db();
        let txn = db.begin_write().unwrap();
        assert_eq!(next_id(&txn, "users").unwrap(), 1);
        assert_eq!(next_id(&txn, "users").unwrap(), 2);
        assert_eq!(next_id(&txn, "payments").unwrap(), 1);
        txn.commit().unwrap();

        let txn = db.begin_write().unwrap();
        assert_eq!(next_id(&txn, "users").unwrap(), 3);
    }

    #[test]
    fn child_keys_sort_by_owner_then_child() {
        let a = make_child_key(1, 99);
        let b = make_child_key(2, 1);
        let c = make_child_key(2, 5);
        assert!(a < b);
        assert!(b < c);

        let (lo, hi) = child_key_bounds(2);
        assert!(lo <= b && c <= hi);
        assert!(a < lo);
    }

    #[test]
    fn health_check_passes_on_fresh_database() {
        let (db, _dir) = temp_db();
        db.health_check().unwrap();
    }
}
