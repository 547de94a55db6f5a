// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent storage for the access pipeline, backed by a single redb file.
//!
//! ## Storage Layout
//!
//! ```text
//! $DATA_DIR/
//!   access.redb       # users, applications, payments, gallery rows
//!   objects/          # gallery image bytes (filesystem object store)
//!     gallery/{user_id}/{uuid}.{ext}
//!     chat-import/{uuid}.{ext}
//! ```

pub mod database;
pub mod repository;

pub use database::{AccessDatabase, StorageError, StorageResult};
pub use repository::{
    ApplicationRepository, ApplicationStatus, CheckoutRecord, GalleryRepository, ImageReaction,
    IntentOutcome, IntentSettlement, LoginProfile, NewApplication, NewGalleryImage,
    PaymentRepository, PaymentStatus, ReviewDecision, ReviewOutcome, StoredApplication,
    StoredGalleryImage, StoredPayment, StoredUser, UserRepository, UserUpdate,
};
