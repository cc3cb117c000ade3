//! Zito money-movement ledger.
//!
//! The three components with cross-request mutable state sit in this crate,
//! all built on one primitive: atomic conditional writes against a shared
//! key-value store ([`store::AtomicKvStore`]).
//!
//! - [`nonce::NonceStore`] — time-bounded replay cache, one consumption per
//!   (credential, nonce) while the record is live
//! - [`quote::QuoteLedger`] — short-lived, single-use price locks
//! - [`idempotency::IdempotencyKeyStore`] — at-most-once execution under
//!   client retries
//!
//! Every store key is prefixed with the credential's environment, so sandbox
//! and production never share nonce, quote, or idempotency space.

pub mod amount;
pub mod idempotency;
pub mod nonce;
pub mod quote;
pub mod store;

use thiserror::Error;

pub use amount::Amount;
pub use idempotency::{ExecutionOutcome, IdempotencyKeyStore};
pub use nonce::{NonceOutcome, NonceStore, NONCE_TTL_SECS};
pub use quote::{
    FeeBreakdown, FeeSchedule, FlatFeeSchedule, Quote, QuoteLedger, TransactionType,
    QUOTE_TTL_SECS,
};
pub use store::{AtomicKvStore, InMemoryKvStore};

/// Errors from the stateful ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The nonce was already consumed within its replay window.
    #[error("nonce has already been used")]
    NonceReplayed,

    /// No quote exists under this id for the calling credential.
    #[error("quote not found: {id}")]
    QuoteNotFound {
        /// The quote id as presented.
        id: String,
    },

    /// The quote's 15-minute validity window has elapsed.
    #[error("quote expired: {id}")]
    QuoteExpired {
        /// The quote id.
        id: String,
    },

    /// The quote was already consumed by an earlier execute call.
    #[error("quote already consumed: {id}")]
    QuoteAlreadyConsumed {
        /// The quote id.
        id: String,
    },

    /// A duplicate execute call found the original still in flight and gave
    /// up waiting for its result.
    #[error("execution still in flight for idempotency key: {key}")]
    DuplicateInFlight {
        /// The idempotency key.
        key: String,
    },

    /// A stored record failed to round-trip through JSON.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The backing store failed. The only retryable class (5xx).
    #[error("storage error: {0}")]
    Storage(String),

    /// Fee or total arithmetic overflowed.
    #[error("arithmetic overflow")]
    Overflow,
}

impl LedgerError {
    /// Stable machine-readable code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NonceReplayed => "nonce_replayed",
            Self::QuoteNotFound { .. } => "quote_not_found",
            Self::QuoteExpired { .. } => "quote_expired",
            Self::QuoteAlreadyConsumed { .. } => "quote_already_consumed",
            Self::DuplicateInFlight { .. } => "duplicate_in_flight",
            Self::Serialization(_) => "internal_error",
            Self::Storage(_) => "storage_unavailable",
            Self::Overflow => "amount_overflow",
        }
    }

    /// HTTP status the gateway surfaces for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NonceReplayed => 401,
            Self::QuoteNotFound { .. } => 404,
            Self::QuoteExpired { .. } | Self::QuoteAlreadyConsumed { .. } => 409,
            Self::DuplicateInFlight { .. } => 409,
            Self::Overflow => 400,
            Self::Serialization(_) | Self::Storage(_) => 500,
        }
    }

    /// True only for internal failures a client may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Serialization(_))
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Common result alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_internal_failures_are_retryable() {
        assert!(LedgerError::Storage("down".into()).is_retryable());
        assert!(!LedgerError::NonceReplayed.is_retryable());
        assert!(!LedgerError::QuoteExpired { id: "q".into() }.is_retryable());
    }

    #[test]
    fn statuses_match_the_wire_contract() {
        assert_eq!(LedgerError::NonceReplayed.http_status(), 401);
        assert_eq!(
            LedgerError::QuoteAlreadyConsumed { id: "q".into() }.http_status(),
            409
        );
        assert_eq!(LedgerError::Storage("down".into()).http_status(), 500);
    }
}
