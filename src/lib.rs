// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access Grant Server - Paid Whitelist Pipeline
//!
//! Carries a player of a private game server from a whitelist application,
//! through admin review and a hosted checkout, to a whitelisted account.
//! Payment gateway notifications are verified and reconciled idempotently.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - JWT verification and principal resolution
//! - `services` - Access tiers, review state machine, reconciliation, gallery
//! - `storage` - Embedded redb database and repositories
//! - `providers` - Payment gateway, object store, chat image source
//! - `webhook` - Notification signatures and event parsing

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod providers;
pub mod services;
pub mod state;
pub mod storage;
pub mod webhook;
