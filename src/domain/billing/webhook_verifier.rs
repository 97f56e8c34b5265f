//! Stripe webhook signature verification.
//!
//! HMAC-SHA256 over `"<timestamp>.<raw body>"` with the endpoint's signing
//! secret, plus a timestamp window against replays.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::stripe_event::StripeEvent;
use super::webhook_errors::WebhookError;

/// Default maximum age for signed events (5 minutes).
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Maximum allowed clock skew for future events (1 minute).
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Parsed components from the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix timestamp when the signature was generated.
    pub timestamp: i64,
    /// Every v1 signature present. Stripe sends several while a secret rolls.
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Parses `t=<timestamp>,v1=<signature>[,v1=<signature>...]`.
    ///
    /// Any unreadable header yields [`WebhookError::InvalidSignature`].
    /// Unknown schemes (`v0`, future versions) are skipped.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .split_once('=')
                .ok_or_else(|| rejected("invalid signature header format"))?;

            match key.trim() {
                "t" => {
                    timestamp = Some(
                        value
                            .trim()
                            .parse()
                            .map_err(|_| rejected("invalid signature timestamp"))?,
                    );
                }
                "v1" => {
                    let signature = hex::decode(value.trim())
                        .map_err(|_| rejected("invalid v1 signature hex"))?;
                    v1_signatures.push(signature);
                }
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| rejected("missing signature timestamp"))?;
        if v1_signatures.is_empty() {
            return Err(rejected("missing v1 signature"));
        }

        Ok(SignatureHeader {
            timestamp,
            v1_signatures,
        })
    }
}

/// An unreadable header is a signature failure, not a payload problem.
fn rejected(reason: &'static str) -> WebhookError {
    tracing::debug!(reason, "Unreadable signature header");
    WebhookError::InvalidSignature
}

/// Verifier for Stripe webhook signatures.
#[derive(Clone)]
pub struct StripeWebhookVerifier {
    secret: SecretString,
    tolerance_secs: i64,
}

impl std::fmt::Debug for StripeWebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeWebhookVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl StripeWebhookVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Verifies the signature against the current time and parses the event.
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent, WebhookError> {
        self.verify_and_parse_at(payload, signature_header, chrono::Utc::now().timestamp())
    }

    /// Same as [`Self::verify_and_parse`] with an explicit clock.
    ///
    /// The body is only parsed once the signature has been accepted.
    pub fn verify_and_parse_at(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> Result<StripeEvent, WebhookError> {
        let header = SignatureHeader::parse(signature_header)?;

        self.validate_timestamp(header.timestamp, now)?;

        let expected = self.compute_signature(header.timestamp, payload)?;
        let matched = header
            .v1_signatures
            .iter()
            .any(|candidate| constant_time_compare(&expected, candidate));
        if !matched {
            return Err(WebhookError::InvalidSignature);
        }

        serde_json::from_slice(payload).map_err(|e| WebhookError::MalformedPayload(e.to_string()))
    }

    fn validate_timestamp(&self, timestamp: i64, now: i64) -> Result<(), WebhookError> {
        let age = now
            .checked_sub(timestamp)
            .ok_or(WebhookError::InvalidTimestamp)?;

        if age > self.tolerance_secs {
            return Err(WebhookError::TimestampOutOfRange);
        }
        if age < -MAX_CLOCK_SKEW_SECS {
            return Err(WebhookError::InvalidTimestamp);
        }

        Ok(())
    }

    fn compute_signature(&self, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, WebhookError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| WebhookError::InvalidSignature)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// Constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Computes a hex HMAC-SHA256 signature for test fixtures.
#[cfg(test)]
pub fn compute_test_signature(secret: &str, timestamp: i64, payload: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "whsec_test_secret_12345";
    const NOW: i64 = 1_704_067_200;
    const PAYLOAD: &str = concat!(
        r#"{"id":"evt_test123","type":"customer.subscription.created","#,
        r#""created":1704067200,"data":{"object":{}}}"#
    );

    fn verifier() -> StripeWebhookVerifier {
        StripeWebhookVerifier::new(SecretString::new(TEST_SECRET.to_string()))
    }

    fn signed_header(timestamp: i64, payload: &str) -> String {
        format!(
            "t={},v1={}",
            timestamp,
            compute_test_signature(TEST_SECRET, timestamp, payload)
        )
    }

    // ══════════════════════════════════════════════════════════════
    // SignatureHeader Parsing
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn parse_header_with_single_v1() {
        let raw = format!("t=1234567890,v1={}", "a".repeat(64));
        let header = SignatureHeader::parse(&raw).unwrap();

        assert_eq!(header.timestamp, 1234567890);
        assert_eq!(header.v1_signatures.len(), 1);
        assert_eq!(header.v1_signatures[0].len(), 32);
    }

    #[test]
    fn parse_header_collects_every_v1() {
        let raw = format!("t=1,v1={},v0={},v1={}", "a".repeat(64), "b".repeat(64), "c".repeat(64));
        let header = SignatureHeader::parse(&raw).unwrap();
        assert_eq!(header.v1_signatures.len(), 2);
    }

    #[test]
    fn parse_header_missing_timestamp_fails() {
        let result = SignatureHeader::parse(&format!("v1={}", "a".repeat(64)));
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn parse_header_missing_v1_fails() {
        let result = SignatureHeader::parse("t=1234567890");
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn parse_header_invalid_hex_fails() {
        let result = SignatureHeader::parse("t=1234567890,v1=not_valid_hex");
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn parse_header_without_pairs_fails() {
        let result = SignatureHeader::parse("garbage");
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    // ══════════════════════════════════════════════════════════════
    // Signature Verification
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn valid_signature_parses_event() {
        let event = verifier()
            .verify_and_parse_at(PAYLOAD.as_bytes(), &signed_header(NOW, PAYLOAD), NOW)
            .unwrap();
        assert_eq!(event.id, "evt_test123");
    }

    #[test]
    fn any_matching_v1_is_accepted() {
        let header = format!(
            "t={},v1={},v1={}",
            NOW,
            "a".repeat(64),
            compute_test_signature(TEST_SECRET, NOW, PAYLOAD)
        );
        assert!(verifier().verify_and_parse_at(PAYLOAD.as_bytes(), &header, NOW).is_ok());
    }

    #[test]
    fn wrong_secret_fails() {
        let foreign = compute_test_signature("whsec_other", NOW, PAYLOAD);
        let header = format!("t={},v1={}", NOW, foreign);
        let result = verifier().verify_and_parse_at(PAYLOAD.as_bytes(), &header, NOW);
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn tampered_payload_fails() {
        let tampered = PAYLOAD.replace("evt_test123", "evt_hacked");
        let header = signed_header(NOW, PAYLOAD);
        let result = verifier().verify_and_parse_at(tampered.as_bytes(), &header, NOW);
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    #[test]
    fn signed_but_unparseable_body_is_malformed() {
        let body = "not valid json";
        let header = signed_header(NOW, body);
        let result = verifier().verify_and_parse_at(body.as_bytes(), &header, NOW);
        assert!(matches!(result, Err(WebhookError::MalformedPayload(_))));
    }

    #[test]
    fn unsigned_garbage_is_rejected_before_parsing() {
        let header = format!("t={},v1={}", NOW, "a".repeat(64));
        let result = verifier().verify_and_parse_at(b"not valid json", &header, NOW);
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
    }

    // ══════════════════════════════════════════════════════════════
    // Timestamp Window
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn timestamp_at_tolerance_boundary_succeeds() {
        assert!(verifier().validate_timestamp(NOW - 300, NOW).is_ok());
    }

    #[test]
    fn timestamp_past_tolerance_fails() {
        let result = verifier().validate_timestamp(NOW - 301, NOW);
        assert!(matches!(result, Err(WebhookError::TimestampOutOfRange)));
    }

    #[test]
    fn future_timestamp_within_skew_succeeds() {
        assert!(verifier().validate_timestamp(NOW + 30, NOW).is_ok());
    }

    #[test]
    fn future_timestamp_beyond_skew_fails() {
        let result = verifier().validate_timestamp(NOW + 120, NOW);
        assert!(matches!(result, Err(WebhookError::InvalidTimestamp)));
    }

    #[test]
    fn extreme_past_timestamp_is_rejected() {
        let result = verifier().validate_timestamp(i64::MIN, NOW);
        assert!(matches!(result, Err(WebhookError::InvalidTimestamp)));
    }

    #[test]
    fn extreme_future_timestamp_is_rejected() {
        let result = verifier().validate_timestamp(i64::MAX, NOW);
        assert!(matches!(result, Err(WebhookError::InvalidTimestamp)));
    }

    #[test]
    fn extreme_header_timestamps_never_reach_hmac() {
        for t in [i64::MIN, i64::MAX] {
            let header = format!("t={},v1={}", t, "0".repeat(64));
            let result = verifier().verify_and_parse_at(b"{}", &header, NOW);
            assert!(matches!(result, Err(WebhookError::InvalidTimestamp)), "t={}", t);
        }
    }

    #[test]
    fn tolerance_is_configurable() {
        let strict = verifier().with_tolerance(10);
        assert!(matches!(
            strict.validate_timestamp(NOW - 11, NOW),
            Err(WebhookError::TimestampOutOfRange)
        ));
    }

    #[test]
    fn verify_and_parse_uses_wall_clock() {
        let now = chrono::Utc::now().timestamp();
        assert!(verifier()
            .verify_and_parse(PAYLOAD.as_bytes(), &signed_header(now, PAYLOAD))
            .is_ok());
    }

    #[test]
    fn debug_output_hides_secret() {
        let rendered = format!("{:?}", verifier());
        assert!(!rendered.contains(TEST_SECRET));
    }
}
