//! Delivery signing and the reference consumer-side verifier.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zito_protocol::clock::ClockSource;
use zito_protocol::signature;

use crate::endpoint::WebhookEndpoint;
use crate::WebhookError;

/// Header carrying `sha256=<hex hmac>`.
pub const SIGNATURE_HEADER: &str = "X-Zito-Signature";
/// Header carrying the delivery timestamp in unix seconds.
pub const TIMESTAMP_HEADER: &str = "X-Zito-Timestamp";
/// Maximum age of a delivery the reference verifier accepts.
pub const TOLERANCE_SECS: i64 = 300;

const SIGNATURE_PREFIX: &str = "sha256=";

/// The string the HMAC covers: `"{timestamp}.{payload_json}"`.
///
/// The timestamp is bound into the mac, so neither header nor body can be
/// swapped independently.
pub fn signed_payload(timestamp: i64, payload_json: &str) -> String {
    format!("{timestamp}.{payload_json}")
}

/// A signed delivery ready to be posted to the endpoint's URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub endpoint_id: String,
    pub url: String,
    pub payload_json: String,
    pub timestamp: i64,
    /// Lower-case hex HMAC-SHA256, without the `sha256=` prefix.
    pub signature: String,
}

impl WebhookDelivery {
    /// Value for [`SIGNATURE_HEADER`].
    pub fn signature_header(&self) -> String {
        format!("{SIGNATURE_PREFIX}{}", self.signature)
    }

    /// Value for [`TIMESTAMP_HEADER`].
    pub fn timestamp_header(&self) -> String {
        self.timestamp.to_string()
    }
}

/// Signs outbound deliveries with each endpoint's own secret.
pub struct WebhookSigner {
    clock: Arc<dyn ClockSource>,
}

impl WebhookSigner {
    pub fn new(clock: Arc<dyn ClockSource>) -> Self {
        Self { clock }
    }

    /// Stamp and sign `payload_json` for `endpoint`.
    ///
    /// The payload is signed byte-for-byte as passed in; callers must post
    /// the exact same bytes, not a re-serialization.
    pub fn sign_delivery(&self, endpoint: &WebhookEndpoint, payload_json: &str) -> WebhookDelivery {
        let timestamp = self.clock.now_unix();
        let message = signed_payload(timestamp, payload_json);
        tracing::debug!(endpoint = %endpoint.id, timestamp, "webhook delivery signed");
        WebhookDelivery {
            endpoint_id: endpoint.id.clone(),
            url: endpoint.url.clone(),
            payload_json: payload_json.to_string(),
            timestamp,
            signature: signature::sign(endpoint.secret.as_bytes(), &message),
        }
    }
}

/// Reference consumer-side check, mirrored by merchant SDKs.
///
/// # Security
///
/// The signature is checked before the timestamp window, so an attacker
/// probing with stale-but-forged deliveries learns nothing about the clock
/// tolerance from the error they get back.
#[derive(Debug, Clone, Copy)]
pub struct WebhookVerifier {
    tolerance_secs: i64,
}

impl Default for WebhookVerifier {
    fn default() -> Self {
        Self {
            tolerance_secs: TOLERANCE_SECS,
        }
    }
}

impl WebhookVerifier {
    pub fn with_tolerance(tolerance_secs: i64) -> Self {
        Self { tolerance_secs }
    }

    /// Verify a received delivery against the raw request bytes.
    ///
    /// `raw_body` must be the body exactly as received off the wire.
    pub fn verify(
        &self,
        secret: &str,
        timestamp_header: &str,
        signature_header: &str,
        raw_body: &str,
        now: i64,
    ) -> Result<(), WebhookError> {
        if signature_header.is_empty() {
            return Err(WebhookError::MissingSignature);
        }
        if timestamp_header.is_empty() {
            return Err(WebhookError::MissingTimestamp);
        }

        let provided_hex = signature_header
            .strip_prefix(SIGNATURE_PREFIX)
            .ok_or(WebhookError::MalformedHeader {
                header: SIGNATURE_HEADER,
            })?;
        let timestamp: i64 =
            timestamp_header
                .trim()
                .parse()
                .map_err(|_| WebhookError::MalformedHeader {
                    header: TIMESTAMP_HEADER,
                })?;

        let message = signed_payload(timestamp, raw_body);
        signature::verify(secret.as_bytes(), &message, provided_hex)
            .map_err(|_| WebhookError::InvalidSignature)?;

        if (now - timestamp).abs() > self.tolerance_secs {
            return Err(WebhookError::StaleTimestamp {
                tolerance_secs: self.tolerance_secs,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zito_protocol::clock::ManualClock;

    const NOW: i64 = 1_768_763_180;
    const SECRET: &str = "whsec_test123";
    const PAYLOAD: &str = r#"{"event":"payment.succeeded","data":{"transaction_id":"test-123"}}"#;

    fn endpoint() -> WebhookEndpoint {
        WebhookEndpoint {
            id: "we_1".into(),
            merchant_id: "merchant-1".into(),
            url: "https://shop.example/hooks".into(),
            secret: SECRET.into(),
            active: true,
        }
    }

    fn signed() -> WebhookDelivery {
        WebhookSigner::new(Arc::new(ManualClock::new(NOW))).sign_delivery(&endpoint(), PAYLOAD)
    }

    #[test]
    fn signature_matches_known_vector() {
        // Independently computed with a reference HMAC-SHA256 implementation.
        assert_eq!(
            signed().signature,
            "bf1c0dd12cef4e04630681c1b9b00e6658a4f84bfefaf86304f3747680714768"
        );
    }

    #[test]
    fn headers_carry_prefix_and_timestamp() {
        let delivery = signed();
        assert_eq!(
            delivery.signature_header(),
            format!("sha256={}", delivery.signature)
        );
        assert_eq!(delivery.timestamp_header(), NOW.to_string());
    }

    #[test]
    fn round_trip_verifies() {
        let delivery = signed();
        let verifier = WebhookVerifier::default();
        assert!(verifier
            .verify(
                SECRET,
                &delivery.timestamp_header(),
                &delivery.signature_header(),
                &delivery.payload_json,
                NOW + 10,
            )
            .is_ok());
    }

    #[test]
    fn tampered_body_fails() {
        let delivery = signed();
        let tampered = PAYLOAD.replace("test-123", "test-999");
        assert_eq!(
            WebhookVerifier::default().verify(
                SECRET,
                &delivery.timestamp_header(),
                &delivery.signature_header(),
                &tampered,
                NOW,
            ),
            Err(WebhookError::InvalidSignature)
        );
    }

    #[test]
    fn altered_timestamp_header_fails_signature_first() {
        // Moving the timestamp forward would defeat replay protection, so
        // the mac must break even though the new timestamp is fresh.
        let delivery = signed();
        assert_eq!(
            WebhookVerifier::default().verify(
                SECRET,
                &(NOW + 60).to_string(),
                &delivery.signature_header(),
                &delivery.payload_json,
                NOW + 60,
            ),
            Err(WebhookError::InvalidSignature)
        );
    }

    #[test]
    fn stale_delivery_rejected_after_tolerance() {
        let delivery = signed();
        let verifier = WebhookVerifier::default();
        assert!(verifier
            .verify(
                SECRET,
                &delivery.timestamp_header(),
                &delivery.signature_header(),
                &delivery.payload_json,
                NOW + TOLERANCE_SECS,
            )
            .is_ok());
        assert_eq!(
            verifier.verify(
                SECRET,
                &delivery.timestamp_header(),
                &delivery.signature_header(),
                &delivery.payload_json,
                NOW + TOLERANCE_SECS + 1,
            ),
            Err(WebhookError::StaleTimestamp {
                tolerance_secs: TOLERANCE_SECS
            })
        );
    }

    #[test]
    fn missing_prefix_is_malformed() {
        let delivery = signed();
        assert_eq!(
            WebhookVerifier::default().verify(
                SECRET,
                &delivery.timestamp_header(),
                &delivery.signature,
                &delivery.payload_json,
                NOW,
            ),
            Err(WebhookError::MalformedHeader {
                header: SIGNATURE_HEADER
            })
        );
    }

    #[test]
    fn empty_headers_are_missing() {
        let delivery = signed();
        let verifier = WebhookVerifier::default();
        assert_eq!(
            verifier.verify(SECRET, &delivery.timestamp_header(), "", PAYLOAD, NOW),
            Err(WebhookError::MissingSignature)
        );
        assert_eq!(
            verifier.verify(SECRET, "", &delivery.signature_header(), PAYLOAD, NOW),
            Err(WebhookError::MissingTimestamp)
        );
    }

    #[test]
    fn non_numeric_timestamp_is_malformed() {
        let delivery = signed();
        assert_eq!(
            WebhookVerifier::default().verify(
                SECRET,
                "yesterday",
                &delivery.signature_header(),
                PAYLOAD,
                NOW,
            ),
            Err(WebhookError::MalformedHeader {
                header: TIMESTAMP_HEADER
            })
        );
    }

    #[test]
    fn wrong_endpoint_secret_fails() {
        let delivery = signed();
        assert_eq!(
            WebhookVerifier::default().verify(
                "whsec_other",
                &delivery.timestamp_header(),
                &delivery.signature_header(),
                &delivery.payload_json,
                NOW,
            ),
            Err(WebhookError::InvalidSignature)
        );
    }
}
