//! At-most-once execution under client retries.
//!
//! Execute endpoints sit behind `execute_once`: the first call under a
//! (credential, idempotency key) pair runs the real work and persists its
//! outcome; every later call, sequential or racing, returns the stored
//! snapshot verbatim instead of re-invoking the work.
//!
//! The in-flight marker is held for the full duration of the work, so a
//! racing duplicate observes "in progress" and waits rather than re-invoking
//! a slow gateway call. Once started, work is not cancelled by a client
//! disconnect: it runs on a detached task and its result is recorded
//! regardless, because the client may reconnect and retry with the same key
//! expecting the real outcome.
//!
//! A client-correctable *failure* of the work (an `Err`) clears the marker so
//! a retry can attempt again; terminal declines that must be memoized are
//! returned as an `Ok` outcome with a failed status.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use zito_protocol::clock::ClockSource;
use zito_protocol::Environment;

use crate::store::{store_key, AtomicKvStore};
use crate::{LedgerError, Result};

const NAMESPACE: &str = "idem";

/// Immutable snapshot of one execution's result, returned verbatim to every
/// retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Terminal status, e.g. `"succeeded"` or `"failed"`.
    pub status: String,
    /// Transaction id assigned by the execution, if one was created.
    pub transaction_id: Option<String>,
    /// Quote the execution consumed, if any.
    pub quote_id: Option<String>,
    /// Full response body as returned to the original caller.
    pub body: serde_json::Value,
}

impl ExecutionOutcome {
    /// A successful execution.
    pub fn succeeded(
        transaction_id: impl Into<String>,
        quote_id: Option<String>,
        body: serde_json::Value,
    ) -> Self {
        Self {
            status: "succeeded".to_string(),
            transaction_id: Some(transaction_id.into()),
            quote_id,
            body,
        }
    }

    /// A terminal decline that must be memoized (retries get the same
    /// decline, the gateway is not called again).
    pub fn declined(reason: impl Into<String>) -> Self {
        Self {
            status: "failed".to_string(),
            transaction_id: None,
            quote_id: None,
            body: serde_json::json!({ "reason": reason.into() }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum IdempotencyRecord {
    InFlight { started_at: i64 },
    Completed { outcome: ExecutionOutcome, created_at: i64 },
}

/// Maps (credential, idempotency key) to the outcome of the execution that
/// ran under it. Records are retained indefinitely: they are the source of
/// truth for "did this already happen".
pub struct IdempotencyKeyStore {
    store: Arc<dyn AtomicKvStore>,
    clock: Arc<dyn ClockSource>,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl IdempotencyKeyStore {
    /// Create a store with default duplicate-wait behavior (50ms polls, 30s
    /// cap).
    pub fn new(store: Arc<dyn AtomicKvStore>, clock: Arc<dyn ClockSource>) -> Self {
        Self {
            store,
            clock,
            poll_interval: Duration::from_millis(50),
            wait_timeout: Duration::from_secs(30),
        }
    }

    /// Override how long a duplicate call waits on an in-flight original.
    pub fn with_wait(mut self, poll_interval: Duration, wait_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.wait_timeout = wait_timeout;
        self
    }

    /// Run `work` at most once for this (environment, credential, key).
    ///
    /// The winner's `work` runs on a detached task so dropping this future
    /// (client disconnect) does not cancel it; its outcome is recorded before
    /// anyone observes completion. Losers wait for the record and return the
    /// stored outcome; a loser that outwaits `wait_timeout` gets
    /// `DuplicateInFlight` and may poll again later with the same key.
    pub async fn execute_once<F, Fut>(
        &self,
        environment: Environment,
        credential_id: &str,
        idempotency_key: &str,
        work: F,
    ) -> Result<ExecutionOutcome>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<ExecutionOutcome>> + Send + 'static,
    {
        let key = store_key(environment, NAMESPACE, credential_id, idempotency_key);
        let marker = serde_json::to_vec(&IdempotencyRecord::InFlight {
            started_at: self.clock.now_unix(),
        })?;

        if self
            .store
            .insert_if_absent(&key, marker.clone(), None)
            .await?
        {
            return self.run_and_record(key, marker, work).await;
        }

        // Someone else holds the key; wait for their outcome.
        let mut waited = Duration::ZERO;
        loop {
            match self.store.get(&key).await? {
                None => {
                    // The original failed and cleared its marker. This call
                    // is now a fresh attempt, not a duplicate.
                    let marker = serde_json::to_vec(&IdempotencyRecord::InFlight {
                        started_at: self.clock.now_unix(),
                    })?;
                    if self
                        .store
                        .insert_if_absent(&key, marker.clone(), None)
                        .await?
                    {
                        return self.run_and_record(key, marker, work).await;
                    }
                    // Lost again; keep waiting.
                }
                Some(raw) => match serde_json::from_slice::<IdempotencyRecord>(&raw)? {
                    IdempotencyRecord::Completed { outcome, .. } => {
                        tracing::debug!(
                            idempotency_key = %idempotency_key,
                            credential = %credential_id,
                            "duplicate execute returned stored outcome"
                        );
                        return Ok(outcome);
                    }
                    IdempotencyRecord::InFlight { .. } => {
                        if waited >= self.wait_timeout {
                            return Err(LedgerError::DuplicateInFlight {
                                key: idempotency_key.to_string(),
                            });
                        }
                        tokio::time::sleep(self.poll_interval).await;
                        waited += self.poll_interval;
                    }
                },
            }
        }
    }

    async fn run_and_record<F, Fut>(
        &self,
        key: String,
        marker: Vec<u8>,
        work: F,
    ) -> Result<ExecutionOutcome>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<ExecutionOutcome>> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let now = self.clock.now_unix();

        // Detached: survives the caller dropping this future.
        let handle = tokio::spawn(async move {
            match work().await {
                Ok(outcome) => {
                    let record = serde_json::to_vec(&IdempotencyRecord::Completed {
                        outcome: outcome.clone(),
                        created_at: now,
                    })?;
                    if !store.compare_and_swap(&key, &marker, record).await? {
                        return Err(LedgerError::Storage(
                            "in-flight idempotency marker changed underneath us".to_string(),
                        ));
                    }
                    Ok(outcome)
                }
                Err(err) => {
                    // Clear the marker so the client can retry the attempt.
                    store.remove(&key).await?;
                    Err(err)
                }
            }
        });

        handle
            .await
            .map_err(|e| LedgerError::Storage(format!("execution task failed: {}", e)))?
    }
}
