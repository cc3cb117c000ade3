//! Nonce tracking for replay attack prevention.
//!
//! A signed request's nonce may be consumed exactly once per credential while
//! its record is live. Records expire after ten minutes, which together with
//! the ±300s timestamp window bounds the replay horizon. A nonce reused after
//! expiry is indistinguishable from a fresh one; the uniqueness invariant is
//! scoped to live records.
//!
//! # Security
//!
//! Consumption is a single insert-if-absent, never a separate check plus
//! insert; of two concurrent identical requests, exactly one is accepted.

use std::sync::Arc;

use zito_protocol::Environment;

use crate::store::{store_key, AtomicKvStore};
use crate::{LedgerError, Result};

/// How long a consumed nonce stays un-reusable, in seconds.
pub const NONCE_TTL_SECS: i64 = 600;

const NAMESPACE: &str = "nonce";

/// Result of a consumption attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceOutcome {
    /// First use; the request may proceed.
    Consumed,
    /// The nonce is live in the replay cache; reject the request.
    AlreadyUsed,
}

/// Time-bounded replay cache over the atomic store.
pub struct NonceStore {
    store: Arc<dyn AtomicKvStore>,
    ttl_secs: i64,
}

impl NonceStore {
    /// Create a store with the standard 10-minute TTL.
    pub fn new(store: Arc<dyn AtomicKvStore>) -> Self {
        Self {
            store,
            ttl_secs: NONCE_TTL_SECS,
        }
    }

    /// Override the TTL (tests, non-standard deployments).
    pub fn with_ttl(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Atomically consume a nonce for a credential.
    pub async fn try_consume(
        &self,
        environment: Environment,
        credential_id: &str,
        nonce: &str,
    ) -> Result<NonceOutcome> {
        let key = store_key(environment, NAMESPACE, credential_id, nonce);
        let created = self
            .store
            .insert_if_absent(&key, Vec::new(), Some(self.ttl_secs))
            .await?;
        Ok(if created {
            NonceOutcome::Consumed
        } else {
            NonceOutcome::AlreadyUsed
        })
    }

    /// `try_consume`, mapping a replay to the protocol error.
    pub async fn require_fresh(
        &self,
        environment: Environment,
        credential_id: &str,
        nonce: &str,
    ) -> Result<()> {
        match self.try_consume(environment, credential_id, nonce).await? {
            NonceOutcome::Consumed => Ok(()),
            NonceOutcome::AlreadyUsed => Err(LedgerError::NonceReplayed),
        }
    }
}
