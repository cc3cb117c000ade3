//! Zito request-authentication protocol.
//!
//! Every inbound merchant API call must be provably authentic, non-replayable,
//! and scoped to an allow-listed caller before it reaches any business logic.
//! This crate implements the stateless half of that contract:
//!
//! - **Canonical serialization**: one deterministic string per request that
//!   signer and verifier both compute ([`canonical`])
//! - **HMAC-SHA256 signing** with constant-time verification ([`signature`])
//! - **Credential resolution** and environment tagging ([`credential`])
//! - **Origin allow-listing** over verified domains and CIDR blocks
//!   ([`allowlist`])
//! - **Timestamp freshness** within a ±300s skew window ([`timestamp`])
//! - **Per-credential rate limiting** ([`rate_limit`])
//!
//! The stateful pieces (nonce replay cache, quote ledger, idempotency store)
//! live in `zito-ledger`; [`verifier::RequestVerifier`] runs everything up to
//! the nonce check and hands the resolved credential back to the caller.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use zito_protocol::canonical::{canonical_string, CanonicalRequest};
//! use zito_protocol::clock::ManualClock;
//! use zito_protocol::credential::{ApiSecret, Credential, Environment, InMemoryCredentialRegistry};
//! use zito_protocol::signature;
//! use zito_protocol::verifier::RequestVerifier;
//!
//! let registry = InMemoryCredentialRegistry::new();
//! registry.insert(
//!     Credential::new("zito_pk_1", ApiSecret::from("sk_1"), Environment::Sandbox),
//! );
//! let verifier = RequestVerifier::new(registry, Arc::new(ManualClock::new(1_768_763_180)));
//!
//! let request = CanonicalRequest::new("POST", "/api/v1/wallets/quote", vec![], "{}");
//! let canonical = canonical_string(&request, 1_768_763_180, "nonce-1", "shop.example");
//! let sig = signature::sign(b"sk_1", &canonical);
//!
//! let verified = verifier.verify(&request, |name| match name {
//!     "x-zito-key" => Some("zito_pk_1".into()),
//!     "x-zito-timestamp" => Some("1768763180".into()),
//!     "x-zito-nonce" => Some("nonce-1".into()),
//!     "x-zito-origin" => Some("shop.example".into()),
//!     "x-zito-signature" => Some(sig.clone()),
//!     "x-zito-version" => Some("1.0".into()),
//!     _ => None,
//! }).unwrap();
//! assert_eq!(verified.credential.id, "zito_pk_1");
//! ```

pub mod allowlist;
pub mod canonical;
pub mod clock;
pub mod credential;
pub mod errors;
pub mod rate_limit;
pub mod signature;
pub mod timestamp;
pub mod verifier;

pub use canonical::{CanonicalRequest, SigningHeaders, PROTOCOL_VERSION};
pub use clock::{ClockSource, ManualClock, SystemClock};
pub use credential::{ApiSecret, Credential, CredentialRegistry, Environment};
pub use errors::ProtocolError;
pub use timestamp::TimestampValidator;
pub use verifier::{RequestVerifier, VerifiedRequest};

/// Common result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
