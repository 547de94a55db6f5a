// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Inbound payment gateway notifications: signature verification and the
//! typed event model.

pub mod event;
pub mod signature;

pub use event::{
    parse_event, CheckoutCompleted, EventParseError, GatewayEvent, GatewayNotification,
    IntentNotice,
};
pub use signature::{SignatureError, WebhookVerifier, SIGNATURE_HEADER};
