// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Whitelist application repository.
//!
//! The `pending_applications` index holds at most one entry per user and is
//! written in the same transaction as the application row, so two concurrent
//! submissions cannot both end up pending.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::database::{
    child_key_bounds, make_child_key, next_id, read_all_desc, read_row, write_row,
    AccessDatabase, StorageError, StorageResult, APPLICATIONS, PENDING_APPLICATIONS,
    USER_APPLICATIONS,
};

/// Application lifecycle status. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ApplicationStatus::Pending)
    }
}

/// Persisted whitelist application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StoredApplication {
    pub id: u64,
    /// Owning user.
    pub user_id: u64,
    /// Why the applicant wants to join (50-2000 chars).
    pub motivation: String,
    /// Building experience (50-2000 chars).
    pub experience: String,
    /// Optional portfolio links or notes (at most 1000 chars).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio: Option<String>,
    /// In-game handle (3-16 chars).
    pub game_handle: String,
    pub status: ApplicationStatus,
    /// Admin who reviewed the application.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated fields of a new submission.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub user_id: u64,
    pub motivation: String,
    pub experience: String,
    pub portfolio: Option<String>,
    pub game_handle: String,
}

/// An admin's verdict on a pending application.
#[derive(Debug, Clone)]
pub struct ReviewDecision {
    pub status: ApplicationStatus,
    pub reviewer_id: u64,
    pub notes: Option<String>,
}

/// Result of recording a review.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewOutcome {
    Reviewed(StoredApplication),
    /// The application had already left `pending`; nothing was written.
    AlreadyReviewed(ApplicationStatus),
}

/// Repository for application rows.
pub struct ApplicationRepository<'a> {
    db: &'a AccessDatabase,
}

impl<'a> ApplicationRepository<'a> {
    pub fn new(db: &'a AccessDatabase) -> Self {
        Self { db }
    }

    /// Insert a pending application.
    ///
    /// # Errors
    /// `IntegrityViolation` if the user already holds a pending application.
    pub fn create_pending(&self, new: NewApplication) -> StorageResult<StoredApplication> {
        let now = Utc::now();
        let write_txn = self.db.begin_write()?;
        let application = {
            let mut pending = write_txn.open_table(PENDING_APPLICATIONS)?;
            if let Some(existing) = pending.get(new.user_id)?.map(|v| v.value()) {
                return Err(StorageError::IntegrityViolation(format!(
                    "User {} already has pending application {existing}",
                    new.user_id
                )));
            }

            let id = next_id(&write_txn, "applications")?;
            let application = StoredApplication {
                id,
                user_id: new.user_id,
                motivation: new.motivation,
                experience: new.experience,
                portfolio: new.portfolio,
                game_handle: new.game_handle,
                status: ApplicationStatus::Pending,
                reviewer_id: None,
                review_notes: None,
                reviewed_at: None,
                created_at: now,
                updated_at: now,
            };

            let mut rows = write_txn.open_table(APPLICATIONS)?;
            write_row(&mut rows, id, &application)?;

            let mut by_user = write_txn.open_table(USER_APPLICATIONS)?;
            let key = make_child_key(application.user_id, id);
            by_user.insert(key.as_slice(), id)?;

            pending.insert(application.user_id, id)?;
            application
        };
        write_txn.commit()?;
        Ok(application)
    }

    /// Get an application by id.
    pub fn get(&self, id: u64) -> StorageResult<StoredApplication> {
        let read_txn = self.db.begin_read()?;
        let rows = read_txn.open_table(APPLICATIONS)?;
        read_row(&rows, id)?.ok_or_else(|| StorageError::NotFound(format!("Application {id}")))
    }

    /// The user's most recently created application, if any.
    pub fn latest_for_user(&self, user_id: u64) -> StorageResult<Option<StoredApplication>> {
        let read_txn = self.db.begin_read()?;
        let by_user = read_txn.open_table(USER_APPLICATIONS)?;
        let (start, end) = child_key_bounds(user_id);

        let latest_id = match by_user.range(start.as_slice()..=end.as_slice())?.next_back() {
            Some(entry) => entry?.1.value(),
            None => return Ok(None),
        };

        let rows = read_txn.open_table(APPLICATIONS)?;
        read_row(&rows, latest_id)
    }

    /// All applications, newest first.
    pub fn list_all(&self) -> StorageResult<Vec<StoredApplication>> {
        let read_txn = self.db.begin_read()?;
        let rows = read_txn.open_table(APPLICATIONS)?;
        read_all_desc(&rows)
    }

    /// Pending applications, newest first.
    pub fn list_pending(&self) -> StorageResult<Vec<StoredApplication>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|a| a.status == ApplicationStatus::Pending)
            .collect())
    }

    /// Record a review on a pending application.
    ///
    /// Reviewing an application that is no longer pending writes nothing and
    /// returns [`ReviewOutcome::AlreadyReviewed`].
    pub fn record_review(&self, id: u64, decision: ReviewDecision) -> StorageResult<ReviewOutcome> {
        let now = Utc::now();
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut rows = write_txn.open_table(APPLICATIONS)?;
            let mut application: StoredApplication = read_row(&rows, id)?
                .ok_or_else(|| StorageError::NotFound(format!("Application {id}")))?;

            if application.status.is_terminal() {
                return Ok(ReviewOutcome::AlreadyReviewed(application.status));
            }

            application.status = decision.status;
            application.reviewer_id = Some(decision.reviewer_id);
            application.review_notes = decision.notes;
            application.reviewed_at = Some(now);
            application.updated_at = now;
            write_row(&mut rows, id, &application)?;

            if application.status.is_terminal() {
                let mut pending = write_txn.open_table(PENDING_APPLICATIONS)?;
                pending.remove(application.user_id)?;
            }
            ReviewOutcome::Reviewed(application)
        };
        write_txn.commit()?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::temp_db;

    fn submission(user_id: u64) -> NewApplication {
        NewApplication {
            user_id,
            motivation: "m".repeat(60),
            experience: "e".repeat(60),
            portfolio: None,
            game_handle: "Builder123".to_string(),
        }
    }

    fn decision(status: ApplicationStatus) -> ReviewDecision {
        ReviewDecision {
            status,
            reviewer_id: 99,
            notes: Some("looks good".to_string()),
        }
    }

    #[test]
    fn second_pending_submission_is_rejected() {
        let (db, _dir) = temp_db();
        let repo = ApplicationRepository::new(&db);

        repo.create_pending(submission(1)).unwrap();
        let err = repo.create_pending(submission(1)).unwrap_err();
        assert!(matches!(err, StorageError::IntegrityViolation(_)));
        assert_eq!(repo.list_all().unwrap().len(), 1);

        // Another user is unaffected
        repo.create_pending(submission(2)).unwrap();
        assert_eq!(repo.list_pending().unwrap().len(), 2);
    }

    #[test]
    fn concurrent_submissions_leave_one_pending() {
        let (db, _dir) = temp_db();

        let successes = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let db = &db;
                    scope.spawn(move || ApplicationRepository::new(db).create_pending(submission(1)))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(Result::is_ok)
                .count()
        });

        assert_eq!(successes, 1);
        let repo = ApplicationRepository::new(&db);
        assert_eq!(repo.list_all().unwrap().len(), 1);
        assert_eq!(repo.list_pending().unwrap().len(), 1);
    }

    #[test]
    fn review_frees_the_pending_slot() {
        let (db, _dir) = temp_db();
        let repo = ApplicationRepository::new(&db);

        let first = repo.create_pending(submission(1)).unwrap();
        let outcome = repo
            .record_review(first.id, decision(ApplicationStatus::Rejected))
            .unwrap();
        let ReviewOutcome::Reviewed(reviewed) = outcome else {
            panic!("expected review to apply");
        };
        assert_eq!(reviewed.status, ApplicationStatus::Rejected);
        assert_eq!(reviewed.reviewer_id, Some(99));
        assert!(reviewed.reviewed_at.is_some());
        assert!(repo.list_pending().unwrap().is_empty());

        let second = repo.create_pending(submission(1)).unwrap();
        assert_eq!(repo.latest_for_user(1).unwrap().unwrap().id, second.id);
    }

    #[test]
    fn re_review_is_refused_and_leaves_row_unchanged() {
        let (db, _dir) = temp_db();
        let repo = ApplicationRepository::new(&db);
        let app = repo.create_pending(submission(1)).unwrap();

        repo.record_review(app.id, decision(ApplicationStatus::Approved))
            .unwrap();
        let outcome = repo
            .record_review(app.id, decision(ApplicationStatus::Rejected))
            .unwrap();

        assert_eq!(
            outcome,
            ReviewOutcome::AlreadyReviewed(ApplicationStatus::Approved)
        );
        assert_eq!(repo.get(app.id).unwrap().status, ApplicationStatus::Approved);
    }

    #[test]
    fn latest_for_user_ignores_other_users() {
        let (db, _dir) = temp_db();
        let repo = ApplicationRepository::new(&db);
        assert!(repo.latest_for_user(1).unwrap().is_none());

        repo.create_pending(submission(1)).unwrap();
        let other = repo.create_pending(submission(2)).unwrap();

        assert_eq!(repo.latest_for_user(2).unwrap().unwrap().id, other.id);
        assert_eq!(repo.latest_for_user(1).unwrap().unwrap().user_id, 1);
    }

    #[test]
    fn review_of_unknown_application_is_not_found() {
        let (db, _dir) = temp_db();
        let repo = ApplicationRepository::new(&db);
        let err = repo
            .record_review(7, decision(ApplicationStatus::Approved))
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
