// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payment notification reconciliation.
//!
//! Notifications arrive at least once, in any order, possibly concurrently.
//! Every write is a create-or-update keyed by the gateway identifiers, so
//! replays converge on the same payment row and the same user flags.
//!
//! Outcomes:
//! - `Applied`: payment state was written
//! - `Deferred`: an intent outcome was parked until its checkout row exists
//! - `Ignored`: event type this service does not consume
//! - `Unresolvable`: the event references no known user or payment, or its
//!   object does not decode
//!
//! Only storage failures are reported as errors; everything else is
//! acknowledged so the gateway does not redeliver unrecoverable data.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use crate::providers::PaymentGateway;
use crate::storage::{
    AccessDatabase, CheckoutRecord, IntentOutcome, IntentSettlement, PaymentRepository,
    PaymentStatus, StorageError, StoredPayment, UserRepository, UserUpdate,
};
use crate::webhook::{
    parse_event, CheckoutCompleted, EventParseError, GatewayEvent, GatewayNotification,
    IntentNotice, SignatureError, WebhookVerifier,
};

/// Upper bound on the receipt lookup.
pub const RECEIPT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// What processing a verified notification did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WebhookOutcome {
    Applied,
    Deferred,
    Ignored,
    Unresolvable,
    /// Gateway test event; verified but not processed.
    TestEvent,
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("signature verification failed: {0}")]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Payload(#[from] EventParseError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Applies gateway notifications to payments and user access flags.
#[derive(Clone)]
pub struct Reconciler {
    db: Arc<AccessDatabase>,
    gateway: Arc<dyn PaymentGateway>,
    receipt_timeout: Duration,
}

impl Reconciler {
    pub fn new(db: Arc<AccessDatabase>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            db,
            gateway,
            receipt_timeout: RECEIPT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    /// Verify, decode and apply a raw notification body.
    ///
    /// The signature is checked before any field of the body is read.
    pub async fn handle(
        &self,
        verifier: &WebhookVerifier,
        signature: Option<&str>,
        payload: &[u8],
    ) -> Result<WebhookOutcome, ReconcileError> {
        verifier.verify(signature, payload)?;
        let event = parse_event(payload)?;

        if event.is_test() {
            info!(event_id = %event.id, event_type = %event.event_type, "Test notification verified");
            return Ok(WebhookOutcome::TestEvent);
        }

        let outcome = self.apply(&event).await?;
        info!(
            event_id = %event.id,
            event_type = %event.event_type,
            outcome = ?outcome,
            "Notification processed"
        );
        Ok(outcome)
    }

    /// Apply an already verified event.
    pub async fn apply(&self, event: &GatewayEvent) -> Result<WebhookOutcome, StorageError> {
        match &event.notification {
            GatewayNotification::CheckoutCompleted(session) => {
                self.checkout_completed(&event.id, session)
            }
            GatewayNotification::PaymentSucceeded(notice) => {
                let receipt_url = self.lookup_receipt(notice).await;
                self.intent_outcome(
                    &event.id,
                    notice,
                    IntentOutcome {
                        status: PaymentStatus::Succeeded,
                        receipt_url,
                    },
                )
            }
            GatewayNotification::PaymentFailed(notice) => self.intent_outcome(
                &event.id,
                notice,
                IntentOutcome {
                    status: PaymentStatus::Failed,
                    receipt_url: None,
                },
            ),
            GatewayNotification::Malformed { reason } => {
                error!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    %reason,
                    "Notification object could not be decoded"
                );
                Ok(WebhookOutcome::Unresolvable)
            }
            GatewayNotification::Unrecognized => {
                debug!(event_id = %event.id, event_type = %event.event_type, "Ignoring notification");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    fn checkout_completed(
        &self,
        event_id: &str,
        session: &CheckoutCompleted,
    ) -> Result<WebhookOutcome, StorageError> {
        let Some(user_id) = session.user_reference() else {
            error!(
                event_id,
                session_id = %session.session_id,
                "Checkout session carries no usable user reference"
            );
            return Ok(WebhookOutcome::Unresolvable);
        };

        let users = UserRepository::new(&self.db);
        if users.find(user_id)?.is_none() {
            error!(
                event_id,
                session_id = %session.session_id,
                user_id,
                "Checkout session references an unknown user"
            );
            return Ok(WebhookOutcome::Unresolvable);
        }

        let record = CheckoutRecord {
            user_id,
            checkout_session_id: session.session_id.clone(),
            payment_intent_id: session.payment_intent_id.clone(),
            amount_minor: session.amount_total,
            currency: session.currency.clone(),
            status: if session.is_paid() {
                PaymentStatus::Succeeded
            } else {
                PaymentStatus::Pending
            },
            payment_method: session.payment_method.clone(),
        };

        let payments = PaymentRepository::new(&self.db);
        let payment = match payments.create(&record) {
            Ok(payment) => payment,
            Err(StorageError::IntegrityViolation(reason)) => {
                debug!(event_id, %reason, "Checkout already recorded, updating");
                match payments.update_from_checkout(&record) {
                    Ok(payment) => payment,
                    Err(StorageError::NotFound(reason) | StorageError::IntegrityViolation(reason)) => {
                        error!(
                            event_id,
                            session_id = %session.session_id,
                            %reason,
                            "Checkout conflicts with an existing payment"
                        );
                        return Ok(WebhookOutcome::Unresolvable);
                    }
                    Err(err) => return Err(err),
                }
            }
            Err(err) => return Err(err),
        };

        self.grant_if_settled(&payment)?;
        Ok(WebhookOutcome::Applied)
    }

    fn intent_outcome(
        &self,
        event_id: &str,
        notice: &IntentNotice,
        outcome: IntentOutcome,
    ) -> Result<WebhookOutcome, StorageError> {
        let payments = PaymentRepository::new(&self.db);
        match payments.record_intent_outcome(&notice.intent_id, outcome)? {
            IntentSettlement::Updated(payment) => {
                self.grant_if_settled(&payment)?;
                Ok(WebhookOutcome::Applied)
            }
            IntentSettlement::Parked => {
                warn!(
                    event_id,
                    intent_id = %notice.intent_id,
                    "No payment for intent yet, outcome parked"
                );
                Ok(WebhookOutcome::Deferred)
            }
        }
    }

    fn grant_if_settled(&self, payment: &StoredPayment) -> Result<(), StorageError> {
        if payment.status != PaymentStatus::Succeeded {
            return Ok(());
        }
        let user = UserRepository::new(&self.db).update(payment.user_id, UserUpdate::AccessGranted)?;
        info!(
            user_id = user.id,
            payment_id = payment.id,
            "Access granted after payment"
        );
        Ok(())
    }

    /// Receipt URL of the intent's charge. Failures leave it unset.
    async fn lookup_receipt(&self, notice: &IntentNotice) -> Option<String> {
        let charge_id = notice.latest_charge.as_deref()?;
        match tokio::time::timeout(self.receipt_timeout, self.gateway.fetch_receipt_url(charge_id))
            .await
        {
            Ok(Ok(url)) => url,
            Ok(Err(err)) => {
                warn!(charge_id, error = %err, "Receipt lookup failed");
                None
            }
            Err(_) => {
                warn!(charge_id, "Receipt lookup timed out");
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::json;

    pub(crate) fn checkout_completed(
        event_id: &str,
        session_id: &str,
        intent_id: &str,
        user_id: u64,
        paid: bool,
    ) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": event_id,
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": session_id,
                "payment_intent": intent_id,
                "amount_total": 1500,
                "currency": "usd",
                "payment_status": if paid { "paid" } else { "unpaid" },
                "metadata": { "user_id": user_id.to_string() },
                "client_reference_id": user_id.to_string(),
                "payment_method_types": ["card"]
            }}
        }))
        .unwrap()
    }

    pub(crate) fn intent_event(event_id: &str, event_type: &str, intent_id: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": event_id,
            "type": event_type,
            "data": { "object": { "id": intent_id, "latest_charge": "ch_1" } }
        }))
        .unwrap()
    }
}
