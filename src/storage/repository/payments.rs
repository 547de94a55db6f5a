// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payment repository keyed by the gateway's checkout-session and
//! payment-intent identifiers.
//!
//! ## Idempotency
//!
//! Both gateway identifiers are unique indexes. `create` fails with
//! `IntegrityViolation` when either identifier is already known, and callers
//! fall back to `update_from_checkout`. Intent outcomes that arrive before
//! their checkout row exists are parked under the intent id and folded into
//! the row by whichever transaction later indexes that intent.

use chrono::{DateTime, Duration, Utc};
use redb::{ReadableTable, Table, WriteTransaction};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use super::super::database::{
    next_id, read_all_desc, read_row, write_row, AccessDatabase, StorageError, StorageResult,
    PARKED_INTENT_OUTCOMES, PAYMENTS, PAYMENT_INTENTS, PAYMENT_SESSIONS,
};

/// Payment lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// Status after observing `next`.
    ///
    /// `pending` never replaces a settled status, `refunded` is final, and a
    /// late `failed` does not undo `succeeded`.
    pub fn advance(self, next: PaymentStatus) -> PaymentStatus {
        match (self, next) {
            (PaymentStatus::Refunded, _) => PaymentStatus::Refunded,
            (current, PaymentStatus::Pending) => current,
            (PaymentStatus::Succeeded, PaymentStatus::Failed) => PaymentStatus::Succeeded,
            (_, next) => next,
        }
    }
}

/// Persisted payment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StoredPayment {
    pub id: u64,
    /// Owning user.
    pub user_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    /// Amount in minor currency units.
    pub amount_minor: u64,
    /// Lowercase ISO currency code.
    pub currency: String,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields carried by a completed checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutRecord {
    pub user_id: u64,
    pub checkout_session_id: String,
    pub payment_intent_id: Option<String>,
    pub amount_minor: u64,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
}

/// Outcome reported by a payment-intent notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentOutcome {
    pub status: PaymentStatus,
    pub receipt_url: Option<String>,
}

impl IntentOutcome {
    fn merge(self, later: IntentOutcome) -> IntentOutcome {
        IntentOutcome {
            status: self.status.advance(later.status),
            receipt_url: later.receipt_url.or(self.receipt_url),
        }
    }
}

/// How long an intent outcome waits for its checkout row. Intents for
/// charges that never went through a checkout session age out.
pub const PARKED_OUTCOME_RETENTION: Duration = Duration::days(7);

#[derive(Debug, Serialize, Deserialize)]
struct ParkedOutcome {
    outcome: IntentOutcome,
    parked_at: DateTime<Utc>,
}

/// What happened to an intent outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum IntentSettlement {
    /// A payment row carried the intent id and was updated.
    Updated(StoredPayment),
    /// No row carries the intent id yet; the outcome was parked.
    Parked,
}

impl StoredPayment {
    fn absorb(&mut self, outcome: &IntentOutcome) {
        self.status = self.status.advance(outcome.status);
        if let Some(url) = &outcome.receipt_url {
            self.receipt_url = Some(url.clone());
        }
        self.updated_at = Utc::now();
    }
}

/// Repository for payment rows.
pub struct PaymentRepository<'a> {
    db: &'a AccessDatabase,
}

impl<'a> PaymentRepository<'a> {
    pub fn new(db: &'a AccessDatabase) -> Self {
        Self { db }
    }

    /// Insert a payment for a completed checkout session.
    ///
    /// # Errors
    /// `IntegrityViolation` if the session id or intent id is already indexed.
    pub fn create(&self, record: &CheckoutRecord) -> StorageResult<StoredPayment> {
        let now = Utc::now();
        let write_txn = self.db.begin_write()?;
        let payment = {
            let mut sessions = write_txn.open_table(PAYMENT_SESSIONS)?;
            if sessions.get(record.checkout_session_id.as_str())?.is_some() {
                return Err(StorageError::IntegrityViolation(format!(
                    "Checkout session {} already recorded",
                    record.checkout_session_id
                )));
            }

            let mut intents = write_txn.open_table(PAYMENT_INTENTS)?;
            if let Some(intent_id) = record.payment_intent_id.as_deref() {
                if intents.get(intent_id)?.is_some() {
                    return Err(StorageError::IntegrityViolation(format!(
                        "Payment intent {intent_id} already recorded"
                    )));
                }
            }

            let id = next_id(&write_txn, "payments")?;
            let mut payment = StoredPayment {
                id,
                user_id: record.user_id,
                checkout_session_id: Some(record.checkout_session_id.clone()),
                payment_intent_id: record.payment_intent_id.clone(),
                amount_minor: record.amount_minor,
                currency: record.currency.clone(),
                status: record.status,
                payment_method: record.payment_method.clone(),
                receipt_url: None,
                created_at: now,
                updated_at: now,
            };

            if let Some(intent_id) = record.payment_intent_id.as_deref() {
                if let Some(parked) = take_parked(&write_txn, intent_id)? {
                    payment.absorb(&parked);
                }
                intents.insert(intent_id, id)?;
            }
            sessions.insert(record.checkout_session_id.as_str(), id)?;

            let mut rows = write_txn.open_table(PAYMENTS)?;
            write_row(&mut rows, id, &payment)?;
            payment
        };
        write_txn.commit()?;
        Ok(payment)
    }

    /// Apply a redelivered (or concurrently raced) checkout notification to
    /// the row already keyed by its session id.
    pub fn update_from_checkout(&self, record: &CheckoutRecord) -> StorageResult<StoredPayment> {
        let write_txn = self.db.begin_write()?;
        let payment = {
            let sessions = write_txn.open_table(PAYMENT_SESSIONS)?;
            let id = sessions
                .get(record.checkout_session_id.as_str())?
                .map(|v| v.value())
                .ok_or_else(|| {
                    StorageError::NotFound(format!(
                        "Payment for checkout session {}",
                        record.checkout_session_id
                    ))
                })?;

            let mut rows = write_txn.open_table(PAYMENTS)?;
            let mut payment: StoredPayment = read_row(&rows, id)?
                .ok_or_else(|| StorageError::NotFound(format!("Payment {id}")))?;

            payment.status = payment.status.advance(record.status);
            payment.amount_minor = record.amount_minor;
            payment.currency = record.currency.clone();
            if payment.payment_method.is_none() {
                payment.payment_method = record.payment_method.clone();
            }

            if payment.payment_intent_id.is_none() {
                if let Some(intent_id) = record.payment_intent_id.as_deref() {
                    let mut intents = write_txn.open_table(PAYMENT_INTENTS)?;
                    let owner = intents.get(intent_id)?.map(|v| v.value());
                    match owner {
                        Some(other) if other != id => {
                            return Err(StorageError::IntegrityViolation(format!(
                                "Payment intent {intent_id} already belongs to payment {other}"
                            )));
                        }
                        Some(_) => {}
                        None => {
                            intents.insert(intent_id, id)?;
                        }
                    }
                    payment.payment_intent_id = Some(intent_id.to_string());
                    if let Some(parked) = take_parked(&write_txn, intent_id)? {
                        payment.absorb(&parked);
                    }
                }
            }

            payment.updated_at = Utc::now();
            write_row(&mut rows, id, &payment)?;
            payment
        };
        write_txn.commit()?;
        Ok(payment)
    }

    /// Apply an intent outcome to the row carrying `intent_id`, or park it
    /// until that row exists.
    pub fn record_intent_outcome(
        &self,
        intent_id: &str,
        outcome: IntentOutcome,
    ) -> StorageResult<IntentSettlement> {
        self.record_intent_outcome_at(intent_id, outcome, Utc::now())
    }

    /// Parking prunes outcomes parked before `now - PARKED_OUTCOME_RETENTION`
    /// in the same transaction.
    pub(crate) fn record_intent_outcome_at(
        &self,
        intent_id: &str,
        outcome: IntentOutcome,
        now: DateTime<Utc>,
    ) -> StorageResult<IntentSettlement> {
        let write_txn = self.db.begin_write()?;
        let settlement = {
            let intents = write_txn.open_table(PAYMENT_INTENTS)?;
            let existing = intents.get(intent_id)?.map(|v| v.value());
            match existing {
                Some(id) => {
                    let mut rows = write_txn.open_table(PAYMENTS)?;
                    let mut payment: StoredPayment = read_row(&rows, id)?
                        .ok_or_else(|| StorageError::NotFound(format!("Payment {id}")))?;
                    payment.absorb(&outcome);
                    write_row(&mut rows, id, &payment)?;
                    IntentSettlement::Updated(payment)
                }
                None => {
                    let merged = match take_parked(&write_txn, intent_id)? {
                        Some(earlier) => earlier.merge(outcome),
                        None => outcome,
                    };
                    let mut parked = write_txn.open_table(PARKED_INTENT_OUTCOMES)?;
                    prune_parked(&mut parked, now - PARKED_OUTCOME_RETENTION)?;
                    let json = serde_json::to_vec(&ParkedOutcome {
                        outcome: merged,
                        parked_at: now,
                    })?;
                    parked.insert(intent_id, json.as_slice())?;
                    IntentSettlement::Parked
                }
            }
        };
        write_txn.commit()?;
        Ok(settlement)
    }

    /// Look up a payment by payment intent id.
    pub fn find_by_intent(&self, intent_id: &str) -> StorageResult<Option<StoredPayment>> {
        let read_txn = self.db.begin_read()?;
        let intents = read_txn.open_table(PAYMENT_INTENTS)?;
        let Some(id) = intents.get(intent_id)?.map(|v| v.value()) else {
            return Ok(None);
        };
        let rows = read_txn.open_table(PAYMENTS)?;
        read_row(&rows, id)
    }

    /// A parked outcome still waiting for its checkout row.
    pub fn parked_outcome(&self, intent_id: &str) -> StorageResult<Option<IntentOutcome>> {
        let read_txn = self.db.begin_read()?;
        let parked = read_txn.open_table(PARKED_INTENT_OUTCOMES)?;
        let bytes = parked.get(intent_id)?.map(|v| v.value().to_vec());
        match bytes {
            Some(bytes) => Ok(Some(serde_json::from_slice::<ParkedOutcome>(&bytes)?.outcome)),
            None => Ok(None),
        }
    }

    #[cfg(test)]
    pub(crate) fn parked_count(&self) -> StorageResult<u64> {
        use redb::ReadableTableMetadata;

        let read_txn = self.db.begin_read()?;
        let parked = read_txn.open_table(PARKED_INTENT_OUTCOMES)?;
        Ok(parked.len()?)
    }

    /// All payments, newest first.
    pub fn list_all(&self) -> StorageResult<Vec<StoredPayment>> {
        let read_txn = self.db.begin_read()?;
        let rows = read_txn.open_table(PAYMENTS)?;
        read_all_desc(&rows)
    }

    /// Payments owned by a user, newest first.
    pub fn list_for_user(&self, user_id: u64) -> StorageResult<Vec<StoredPayment>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|p| p.user_id == user_id)
            .collect())
    }
}

/// Remove and return the parked outcome for an intent, if any.
fn take_parked(txn: &WriteTransaction, intent_id: &str) -> StorageResult<Option<IntentOutcome>> {
    let mut parked: Table<'_, &str, &[u8]> = txn.open_table(PARKED_INTENT_OUTCOMES)?;
    let bytes = parked.remove(intent_id)?.map(|v| v.value().to_vec());
    match bytes {
        Some(bytes) => Ok(Some(serde_json::from_slice::<ParkedOutcome>(&bytes)?.outcome)),
        None => Ok(None),
    }
}

/// Drop parked outcomes older than `cutoff`.
fn prune_parked(parked: &mut Table<'_, &str, &[u8]>, cutoff: DateTime<Utc>) -> StorageResult<()> {
    let mut expired = Vec::new();
    for entry in parked.iter()? {
        let (key, value) = entry?;
        let entry: ParkedOutcome = serde_json::from_slice(value.value())?;
        if entry.parked_at < cutoff {
            expired.push(key.value().to_string());
        }
    }
    for key in &expired {
        parked.remove(key.as_str())?;
    }
    if !expired.is_empty() {
        debug!(pruned = expired.len(), "Pruned expired parked intent outcomes");
    }
    Ok(())
}
