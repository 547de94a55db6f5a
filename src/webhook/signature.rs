// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Payment gateway notification signatures.
//!
//! Header format: `Stripe-Signature: t=<unix>,v1=<hex>[,v1=<hex>...]`.
//! The signed payload is `"<t>." + raw body`, HMAC-SHA256 keyed with the
//! endpoint secret. Any matching `v1` entry is accepted, which covers secret
//! rotation windows.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signature header name.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum age (and future skew) of a signed timestamp, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("Missing signature header")]
    Missing,
    #[error("Malformed signature header")]
    Malformed,
    #[error("No signatures found matching the expected signature for payload")]
    Mismatch,
    #[error("Timestamp outside the tolerance zone")]
    Expired,
}

/// Verifies notification signatures with the endpoint's shared secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"<redacted>")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    /// Verify `header` against the raw request body at the current time.
    pub fn verify(&self, header: Option<&str>, payload: &[u8]) -> Result<(), SignatureError> {
        self.verify_at(header, payload, Utc::now().timestamp())
    }

    /// Verify against an explicit clock reading.
    pub fn verify_at(
        &self,
        header: Option<&str>,
        payload: &[u8],
        now: i64,
    ) -> Result<(), SignatureError> {
        let header = header.ok_or(SignatureError::Missing)?;
        let (timestamp, signatures) = parse_header(header)?;

        let mac = self.mac_for(timestamp, payload)?;
        let matched = signatures
            .iter()
            .filter_map(|sig| hex::decode(sig).ok())
            .any(|sig| mac.clone().verify_slice(&sig).is_ok());
        if !matched {
            return Err(SignatureError::Mismatch);
        }

        if (now - timestamp).abs() > self.tolerance_secs {
            return Err(SignatureError::Expired);
        }
        Ok(())
    }

    /// Produce a header value for `payload` signed at `timestamp`.
    ///
    /// Used by local tooling and tests to simulate gateway deliveries.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        let signature = self
            .mac_for(timestamp, payload)
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
            .unwrap_or_default();
        format!("t={timestamp},v1={signature}")
    }

    fn mac_for(&self, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, SignatureError> {
        // HMAC accepts keys of any length
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| SignatureError::Mismatch)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}

/// Split the header into its timestamp and `v1` signatures.
fn parse_header(header: &str) -> Result<(i64, Vec<&str>), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| SignatureError::Malformed)?,
                )
            }
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    match timestamp {
        Some(t) if !signatures.is_empty() => Ok((t, signatures)),
        _ => Err(SignatureError::Malformed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_760_000_000;
    const BODY: &[u8] = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;

    #[test]
    fn signed_payload_verifies() {
        let verifier = WebhookVerifier::new(SECRET);
        let header = verifier.sign(BODY, NOW);
        assert_eq!(verifier.verify_at(Some(&header), BODY, NOW + 10), Ok(()));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let verifier = WebhookVerifier::new(SECRET);
        let header = verifier.sign(BODY, NOW);
        let tampered = br#"{"id":"evt_1","type":"checkout.session.completed "}"#;
        assert_eq!(
            verifier.verify_at(Some(&header), tampered, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let header = WebhookVerifier::new("whsec_other").sign(BODY, NOW);
        let verifier = WebhookVerifier::new(SECRET);
        assert_eq!(
            verifier.verify_at(Some(&header), BODY, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn any_matching_v1_entry_is_accepted() {
        let verifier = WebhookVerifier::new(SECRET);
        let good = verifier.sign(BODY, NOW);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={NOW},v1=deadbeef,v0=ignored,v1={good_sig}");
        assert_eq!(verifier.verify_at(Some(&header), BODY, NOW), Ok(()));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let verifier = WebhookVerifier::new(SECRET);
        let header = verifier.sign(BODY, NOW);
        assert_eq!(
            verifier.verify_at(Some(&header), BODY, NOW + DEFAULT_TOLERANCE_SECS + 1),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn missing_and_malformed_headers() {
        let verifier = WebhookVerifier::new(SECRET);
        assert_eq!(verifier.verify_at(None, BODY, NOW), Err(SignatureError::Missing));
        assert_eq!(
            verifier.verify_at(Some("v1=abc"), BODY, NOW),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verifier.verify_at(Some("t=abc,v1=abc"), BODY, NOW),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verifier.verify_at(Some(&format!("t={NOW}")), BODY, NOW),
            Err(SignatureError::Malformed)
        );
    }
}
