// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the access database.
//!
//! Each repository wraps one entity table plus its secondary indexes. Unique
//! constraints surface as `StorageError::IntegrityViolation`.

pub mod applications;
pub mod gallery;
pub mod payments;
pub mod users;

pub use applications::{
    ApplicationRepository, ApplicationStatus, NewApplication, ReviewDecision, ReviewOutcome,
    StoredApplication,
};
pub use gallery::{GalleryRepository, ImageReaction, NewGalleryImage, StoredGalleryImage};
pub use payments::{
    CheckoutRecord, IntentOutcome, IntentSettlement, PaymentRepository, PaymentStatus,
    StoredPayment,
};
pub use users::{LoginProfile, StoredUser, UserRepository, UserUpdate};
