//! Outbound webhook signing for Zito event deliveries.
//!
//! Every delivery is signed with the endpoint's own secret over the string
//! `"{timestamp}.{payload_json}"` and shipped with two headers:
//!
//! - `X-Zito-Signature: sha256=<hex hmac>`
//! - `X-Zito-Timestamp: <unix seconds>`
//!
//! Binding the timestamp into the signed payload means a captured delivery
//! cannot be replayed later with a fresh timestamp, and the timestamp header
//! cannot be altered without invalidating the signature. [`WebhookVerifier`]
//! is the reference consumer-side check; merchant SDKs mirror it.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use zito_protocol::clock::{ClockSource, ManualClock};
//! use zito_webhooks::{WebhookEndpoint, WebhookSigner, WebhookVerifier};
//!
//! let clock = Arc::new(ManualClock::new(1_768_763_180));
//! let endpoint = WebhookEndpoint::new("merchant-1", "https://shop.example/hooks");
//!
//! let signer = WebhookSigner::new(clock.clone());
//! let delivery = signer.sign_delivery(&endpoint, r#"{"event":"payment.succeeded"}"#);
//!
//! let verifier = WebhookVerifier::default();
//! verifier
//!     .verify(
//!         endpoint.secret.as_str(),
//!         &delivery.timestamp_header(),
//!         &delivery.signature_header(),
//!         &delivery.payload_json,
//!         clock.now_unix(),
//!     )
//!     .unwrap();
//! ```

use thiserror::Error;

pub mod endpoint;
pub mod signing;

pub use endpoint::{generate_secret, WebhookEndpoint};
pub use signing::{
    signed_payload, WebhookDelivery, WebhookSigner, WebhookVerifier, SIGNATURE_HEADER,
    TIMESTAMP_HEADER, TOLERANCE_SECS,
};

/// Failures surfaced by the consumer-side delivery check.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WebhookError {
    /// The `X-Zito-Signature` header is absent or empty.
    #[error("missing webhook signature header")]
    MissingSignature,

    /// The `X-Zito-Timestamp` header is absent or empty.
    #[error("missing webhook timestamp header")]
    MissingTimestamp,

    /// A header is present but not in the expected shape
    /// (`sha256=<hex>` for the signature, unix seconds for the timestamp).
    #[error("malformed webhook header {header}")]
    MalformedHeader { header: &'static str },

    /// The HMAC does not match the delivered payload and timestamp.
    #[error("webhook signature verification failed")]
    InvalidSignature,

    /// The delivery timestamp is outside the acceptance window.
    #[error("webhook timestamp outside the {tolerance_secs}s tolerance window")]
    StaleTimestamp { tolerance_secs: i64 },
}

impl WebhookError {
    /// Stable machine-readable code for delivery-failure records.
    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::MissingSignature => "missing_signature",
            WebhookError::MissingTimestamp => "missing_timestamp",
            WebhookError::MalformedHeader { .. } => "malformed_header",
            WebhookError::InvalidSignature => "invalid_signature",
            WebhookError::StaleTimestamp { .. } => "stale_timestamp",
        }
    }
}

/// Common result alias for webhook operations.
pub type Result<T> = std::result::Result<T, WebhookError>;
