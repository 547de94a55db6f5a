// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Whitelist application submission and review.

use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::auth::Principal;
use crate::storage::{
    AccessDatabase, ApplicationRepository, ApplicationStatus, NewApplication, ReviewDecision,
    ReviewOutcome, StorageError, StoredApplication, UserRepository,
};

use super::{check_length, non_blank, ServiceError, ServiceResult};

pub const MOTIVATION_MIN: usize = 50;
pub const MOTIVATION_MAX: usize = 2000;
pub const PORTFOLIO_MAX: usize = 1000;
pub const HANDLE_MIN: usize = 3;
pub const HANDLE_MAX: usize = 16;
pub const REVIEW_NOTES_MAX: usize = 1000;

/// Request body for a new application.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubmitApplicationRequest {
    /// Why the applicant wants to join (50-2000 chars).
    pub motivation: String,
    /// Building experience (50-2000 chars).
    pub experience: String,
    /// Portfolio links or notes (at most 1000 chars).
    #[serde(default)]
    pub portfolio: Option<String>,
    /// In-game handle (3-16 chars).
    pub game_handle: String,
}

/// Target status of a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReviewVerdict {
    Approved,
    Rejected,
}

impl From<ReviewVerdict> for ApplicationStatus {
    fn from(verdict: ReviewVerdict) -> Self {
        match verdict {
            ReviewVerdict::Approved => ApplicationStatus::Approved,
            ReviewVerdict::Rejected => ApplicationStatus::Rejected,
        }
    }
}

/// Request body for an admin review.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReviewApplicationRequest {
    pub status: ReviewVerdict,
    #[serde(default)]
    pub review_notes: Option<String>,
}

/// Applicant details shown to admins next to an application.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApplicantSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Application as listed for admins.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApplicationWithApplicant {
    #[serde(flatten)]
    pub application: StoredApplication,
    /// `None` if the owning user row is gone.
    pub applicant: Option<ApplicantSummary>,
}

/// Submit a new pending application for the caller.
///
/// # Errors
/// `Validation` on out-of-range fields, `Conflict` if the caller already has
/// a pending application.
pub fn submit(
    db: &AccessDatabase,
    principal: &Principal,
    request: SubmitApplicationRequest,
) -> ServiceResult<StoredApplication> {
    let user = principal.require_user()?;

    let motivation = request.motivation.trim().to_string();
    let experience = request.experience.trim().to_string();
    let game_handle = request.game_handle.trim().to_string();
    let portfolio = non_blank(request.portfolio);

    check_length("Motivation", &motivation, MOTIVATION_MIN, MOTIVATION_MAX)?;
    check_length("Experience", &experience, MOTIVATION_MIN, MOTIVATION_MAX)?;
    if let Some(portfolio) = &portfolio {
        check_length("Portfolio", portfolio, 0, PORTFOLIO_MAX)?;
    }
    check_length("Game handle", &game_handle, HANDLE_MIN, HANDLE_MAX)?;

    let repo = ApplicationRepository::new(db);
    let application = repo
        .create_pending(NewApplication {
            user_id: user.id,
            motivation,
            experience,
            portfolio,
            game_handle,
        })
        .map_err(|err| match err {
            StorageError::IntegrityViolation(_) => {
                ServiceError::Conflict("You already have a pending application".to_string())
            }
            other => other.into(),
        })?;

    info!(
        user_id = user.id,
        application_id = application.id,
        "Application submitted"
    );
    Ok(application)
}

/// The caller's most recent application.
pub fn get_mine(
    db: &AccessDatabase,
    principal: &Principal,
) -> ServiceResult<Option<StoredApplication>> {
    let user = principal.require_user()?;
    Ok(ApplicationRepository::new(db).latest_for_user(user.id)?)
}

/// Every application, newest first. Admin only.
pub fn list_all(
    db: &AccessDatabase,
    principal: &Principal,
) -> ServiceResult<Vec<ApplicationWithApplicant>> {
    principal.require_admin()?;
    let applications = ApplicationRepository::new(db).list_all()?;
    with_applicants(db, applications)
}

/// Pending applications, newest first. Admin only.
pub fn list_pending(
    db: &AccessDatabase,
    principal: &Principal,
) -> ServiceResult<Vec<ApplicationWithApplicant>> {
    principal.require_admin()?;
    let applications = ApplicationRepository::new(db).list_pending()?;
    with_applicants(db, applications)
}

/// Approve or reject a pending application. Admin only.
///
/// Terminal applications cannot be reviewed again.
///
/// # Errors
/// `NotFound` for an unknown id, `Conflict` if the application was already
/// reviewed.
pub fn review(
    db: &AccessDatabase,
    principal: &Principal,
    application_id: u64,
    request: ReviewApplicationRequest,
) -> ServiceResult<StoredApplication> {
    let admin = principal.require_admin()?;

    let notes = non_blank(request.review_notes);
    if let Some(notes) = &notes {
        check_length("Review notes", notes, 0, REVIEW_NOTES_MAX)?;
    }

    let outcome = ApplicationRepository::new(db).record_review(
        application_id,
        ReviewDecision {
            status: request.status.into(),
            reviewer_id: admin.id,
            notes,
        },
    )?;

    match outcome {
        ReviewOutcome::Reviewed(application) => {
            info!(
                application_id,
                reviewer_id = admin.id,
                status = ?application.status,
                "Application reviewed"
            );
            Ok(application)
        }
        ReviewOutcome::AlreadyReviewed(status) => Err(ServiceError::Conflict(format!(
            "Application has already been {}",
            match status {
                ApplicationStatus::Approved => "approved",
                ApplicationStatus::Rejected => "rejected",
                ApplicationStatus::Pending => "reviewed",
            }
        ))),
    }
}

fn with_applicants(
    db: &AccessDatabase,
    applications: Vec<StoredApplication>,
) -> ServiceResult<Vec<ApplicationWithApplicant>> {
    let users = UserRepository::new(db);
    applications
        .into_iter()
        .map(|application| -> ServiceResult<ApplicationWithApplicant> {
            let applicant = users.find(application.user_id)?.map(|user| ApplicantSummary {
                display_name: user.display_name,
                email: user.email,
            });
            Ok(ApplicationWithApplicant {
                application,
                applicant,
            })
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn valid_request() -> SubmitApplicationRequest {
    SubmitApplicationRequest {
        motivation: "I want to build a cathedral with friends on this server. ".repeat(2),
        experience: "Ten years of survival builds, redstone farms and castles. ".repeat(2),
        portfolio: None,
        game_handle: "Builder123".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthError, Role};
    use crate::storage::database::temp_db;
    use crate::storage::LoginProfile;

    fn login(db: &AccessDatabase, subject: &str, role: Role) -> Principal {
        let user = UserRepository::new(db)
            .upsert_login(&LoginProfile {
                external_id: subject,
                display_name: Some(subject),
                email: Some("player@example.com"),
                role,
            })
            .unwrap();
        Principal::from_user(user)
    }

    fn approve() -> ReviewApplicationRequest {
        ReviewApplicationRequest {
            status: ReviewVerdict::Approved,
            review_notes: Some("Welcome aboard".to_string()),
        }
    }

    #[test]
    fn submit_twice_conflicts_and_keeps_one_row() {
        let (db, _dir) = temp_db();
        let user = login(&db, "user_a", Role::User);

        let first = submit(&db, &user, valid_request()).unwrap();
        assert_eq!(first.status, ApplicationStatus::Pending);

        let err = submit(&db, &user, valid_request()).unwrap_err();
        assert!(
            matches!(err, ServiceError::Conflict(ref msg) if msg == "You already have a pending application")
        );
        assert_eq!(ApplicationRepository::new(&db).list_all().unwrap().len(), 1);
    }

    #[test]
    fn short_fields_are_rejected_without_insert() {
        let (db, _dir) = temp_db();
        let user = login(&db, "user_a", Role::User);

        let mut request = valid_request();
        request.motivation = "too short".to_string();
        assert!(matches!(
            submit(&db, &user, request),
            Err(ServiceError::Validation(_))
        ));

        let mut request = valid_request();
        request.game_handle = "ab".to_string();
        assert!(matches!(
            submit(&db, &user, request),
            Err(ServiceError::Validation(_))
        ));

        let mut request = valid_request();
        request.portfolio = Some("p".repeat(PORTFOLIO_MAX + 1));
        assert!(matches!(
            submit(&db, &user, request),
            Err(ServiceError::Validation(_))
        ));

        assert!(ApplicationRepository::new(&db).list_all().unwrap().is_empty());
    }

    #[test]
    fn anonymous_submit_is_unauthenticated() {
        let (db, _dir) = temp_db();
        let err = submit(&db, &Principal::Anonymous, valid_request()).unwrap_err();
        assert!(matches!(err, ServiceError::Auth(AuthError::Unauthenticated)));
    }

    #[test]
    fn review_then_re_review_is_refused() {
        let (db, _dir) = temp_db();
        let user = login(&db, "user_a", Role::User);
        let admin = login(&db, "admin_a", Role::Admin);
        let application = submit(&db, &user, valid_request()).unwrap();

        let reviewed = review(&db, &admin, application.id, approve()).unwrap();
        assert_eq!(reviewed.status, ApplicationStatus::Approved);
        assert_eq!(reviewed.reviewer_id, admin.user().map(|u| u.id));
        assert_eq!(reviewed.review_notes.as_deref(), Some("Welcome aboard"));

        let reject = ReviewApplicationRequest {
            status: ReviewVerdict::Rejected,
            review_notes: None,
        };
        let err = review(&db, &admin, application.id, reject).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(ref msg) if msg.contains("approved")));
        assert_eq!(
            ApplicationRepository::new(&db)
                .get(application.id)
                .unwrap()
                .status,
            ApplicationStatus::Approved
        );
    }

    #[test]
    fn review_does_not_touch_user_flags() {
        let (db, _dir) = temp_db();
        let user = login(&db, "user_a", Role::User);
        let admin = login(&db, "admin_a", Role::Admin);
        let application = submit(&db, &user, valid_request()).unwrap();

        review(&db, &admin, application.id, approve()).unwrap();

        let stored = UserRepository::new(&db).get(application.user_id).unwrap();
        assert!(!stored.has_paid);
        assert!(!stored.is_whitelisted);
    }

    #[test]
    fn member_cannot_review_or_list() {
        let (db, _dir) = temp_db();
        let user = login(&db, "user_a", Role::User);
        let application = submit(&db, &user, valid_request()).unwrap();

        let err = review(&db, &user, application.id, approve()).unwrap_err();
        assert!(matches!(err, ServiceError::Auth(AuthError::AdminRequired)));
        assert!(matches!(
            list_all(&db, &user),
            Err(ServiceError::Auth(AuthError::AdminRequired))
        ));
        assert!(matches!(
            list_pending(&db, &user),
            Err(ServiceError::Auth(AuthError::AdminRequired))
        ));
        assert_eq!(
            ApplicationRepository::new(&db)
                .get(application.id)
                .unwrap()
                .status,
            ApplicationStatus::Pending
        );
    }

    #[test]
    fn unknown_application_is_not_found() {
        let (db, _dir) = temp_db();
        let admin = login(&db, "admin_a", Role::Admin);
        let err = review(&db, &admin, 404, approve()).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn admin_lists_include_applicant_and_filter_pending() {
        let (db, _dir) = temp_db();
        let alice = login(&db, "alice", Role::User);
        let bob = login(&db, "bob", Role::User);
        let admin = login(&db, "admin_a", Role::Admin);

        let first = submit(&db, &alice, valid_request()).unwrap();
        submit(&db, &bob, valid_request()).unwrap();
        review(&db, &admin, first.id, approve()).unwrap();

        let all = list_all(&db, &admin).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(
            all[0].applicant.as_ref().and_then(|a| a.display_name.as_deref()),
            Some("bob")
        );

        let pending = list_pending(&db, &admin).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].application.status, ApplicationStatus::Pending);

        let mine = get_mine(&db, &alice).unwrap().unwrap();
        assert_eq!(mine.status, ApplicationStatus::Approved);
    }
}
