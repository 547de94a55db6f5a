// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed payment gateway notifications.
//!
//! The gateway's `type` tag is decoded once into [`GatewayNotification`], a
//! closed set of the variants the reconciler handles plus `Unrecognized`.
//! Only an undecodable envelope is a parse error. A known event type whose
//! object does not decode becomes `Malformed` so it can be acknowledged.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_FAILED: &str = "payment_intent.payment_failed";

const TEST_EVENT_PREFIX: &str = "evt_test_";

#[derive(Debug, thiserror::Error)]
#[error("invalid notification payload: {0}")]
pub struct EventParseError(#[from] serde_json::Error);

/// A verified notification envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayEvent {
    pub id: String,
    pub event_type: String,
    pub notification: GatewayNotification,
}

impl GatewayEvent {
    /// Dashboard "send test webhook" deliveries.
    pub fn is_test(&self) -> bool {
        self.id.starts_with(TEST_EVENT_PREFIX)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayNotification {
    CheckoutCompleted(CheckoutCompleted),
    PaymentSucceeded(IntentNotice),
    PaymentFailed(IntentNotice),
    /// Known event type whose object could not be decoded.
    Malformed { reason: String },
    Unrecognized,
}

/// A completed hosted checkout session.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutCompleted {
    pub session_id: String,
    pub payment_intent_id: Option<String>,
    pub amount_total: u64,
    pub currency: String,
    pub payment_status: Option<String>,
    pub metadata_user_id: Option<String>,
    pub client_reference_id: Option<String>,
    pub payment_method: Option<String>,
}

impl CheckoutCompleted {
    /// The gateway already reports the session as paid.
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid")
    }

    /// Owning user id: metadata first, then the client reference.
    pub fn user_reference(&self) -> Option<u64> {
        self.metadata_user_id
            .as_deref()
            .and_then(parse_user_id)
            .or_else(|| self.client_reference_id.as_deref().and_then(parse_user_id))
    }
}

/// A payment-intent outcome notification.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentNotice {
    pub intent_id: String,
    /// Charge from which a receipt URL can be looked up.
    pub latest_charge: Option<String>,
}

fn parse_user_id(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|id| *id > 0)
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: Value,
}

/// Either a bare id or an expanded object carrying one.
#[derive(Deserialize)]
#[serde(untagged)]
enum Expandable {
    Id(String),
    Object { id: String },
}

impl Expandable {
    fn into_id(self) -> String {
        match self {
            Expandable::Id(id) | Expandable::Object { id } => id,
        }
    }
}

#[derive(Deserialize)]
struct RawCheckoutSession {
    id: String,
    #[serde(default)]
    payment_intent: Option<Expandable>,
    #[serde(default)]
    amount_total: Option<u64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    metadata: Option<HashMap<String, Value>>,
    #[serde(default)]
    client_reference_id: Option<String>,
    #[serde(default)]
    payment_method_types: Vec<String>,
}

#[derive(Deserialize)]
struct RawPaymentIntent {
    id: String,
    #[serde(default)]
    latest_charge: Option<Expandable>,
}

fn checkout_from_raw(session: RawCheckoutSession) -> CheckoutCompleted {
    CheckoutCompleted {
        session_id: session.id,
        payment_intent_id: session.payment_intent.map(Expandable::into_id),
        amount_total: session.amount_total.unwrap_or(0),
        currency: session
            .currency
            .map(|c| c.to_lowercase())
            .unwrap_or_else(|| "usd".to_string()),
        payment_status: session.payment_status,
        metadata_user_id: session
            .metadata
            .and_then(|mut m| m.remove("user_id"))
            .and_then(metadata_text),
        client_reference_id: session.client_reference_id,
        payment_method: session.payment_method_types.into_iter().next(),
    }
}

/// Metadata values are strings on the wire, but numbers are accepted too.
fn metadata_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decode a verified raw body.
pub fn parse_event(payload: &[u8]) -> Result<GatewayEvent, EventParseError> {
    let raw: RawEvent = serde_json::from_slice(payload)?;

    let notification = match raw.event_type.as_str() {
        CHECKOUT_COMPLETED => match serde_json::from_value::<RawCheckoutSession>(raw.data.object) {
            Ok(session) => GatewayNotification::CheckoutCompleted(checkout_from_raw(session)),
            Err(err) => GatewayNotification::Malformed {
                reason: err.to_string(),
            },
        },
        PAYMENT_SUCCEEDED | PAYMENT_FAILED => {
            match serde_json::from_value::<RawPaymentIntent>(raw.data.object) {
                Ok(intent) => {
                    let notice = IntentNotice {
                        intent_id: intent.id,
                        latest_charge: intent.latest_charge.map(Expandable::into_id),
                    };
                    if raw.event_type == PAYMENT_SUCCEEDED {
                        GatewayNotification::PaymentSucceeded(notice)
                    } else {
                        GatewayNotification::PaymentFailed(notice)
                    }
                }
                Err(err) => GatewayNotification::Malformed {
                    reason: err.to_string(),
                },
            }
        }
        _ => GatewayNotification::Unrecognized,
    };

    Ok(GatewayEvent {
        id: raw.id,
        event_type: raw.event_type,
        notification,
    })
}
