//! End-to-end quote → execute → retry scenario.
//!
//! Walks the full merchant integration path: request a quote, execute
//! against it with an idempotency key, retry with the same key, and attempt
//! to reuse the spent quote under a fresh key.

use std::sync::Arc;
use std::time::Duration;

use zito_ledger::{
    Amount, ExecutionOutcome, FlatFeeSchedule, IdempotencyKeyStore, InMemoryKvStore, LedgerError,
    QuoteLedger, TransactionType, QUOTE_TTL_SECS,
};
use zito_protocol::clock::ManualClock;
use zito_protocol::{ApiSecret, Credential, Environment};

struct Gateway {
    clock: Arc<ManualClock>,
    quotes: Arc<QuoteLedger>,
    idempotency: Arc<IdempotencyKeyStore>,
    credential: Credential,
}

impl Gateway {
    fn new() -> Self {
        let clock = Arc::new(ManualClock::new(1_768_763_180));
        let store = InMemoryKvStore::new_shared(clock.clone());
        Self {
            quotes: Arc::new(QuoteLedger::new(
                store.clone(),
                Arc::new(FlatFeeSchedule {
                    gateway_bps: 150,
                    platform_bps: 100,
                }),
                clock.clone(),
            )),
            idempotency: Arc::new(
                IdempotencyKeyStore::new(store, clock.clone())
                    .with_wait(Duration::from_millis(5), Duration::from_secs(5)),
            ),
            credential: Credential::new(
                "zito_pk_live_c1",
                ApiSecret::from("sk_live_c1"),
                Environment::Production,
            ),
            clock,
        }
    }

    /// What the collect endpoint does behind the verification pipeline:
    /// consume the quote and call the upstream gateway, all under the
    /// idempotency key.
    async fn execute_collect(
        &self,
        quote_id: &str,
        idempotency_key: &str,
    ) -> Result<ExecutionOutcome, LedgerError> {
        let quotes = Arc::clone(&self.quotes);
        let credential_id = self.credential.id.clone();
        let quote_id = quote_id.to_string();

        self.idempotency
            .execute_once(
                self.credential.environment,
                &self.credential.id,
                idempotency_key,
                move || async move {
                    let quote = quotes
                        .consume(Environment::Production, &credential_id, &quote_id)
                        .await?;
                    Ok(ExecutionOutcome::succeeded(
                        format!("txn-{}", quote.id),
                        Some(quote.id.clone()),
                        serde_json::json!({
                            "status": "succeeded",
                            "total_amount": quote.total_amount,
                            "net_to_merchant": quote.net_to_merchant,
                        }),
                    ))
                },
            )
            .await
    }
}

#[tokio::test]
async fn quote_execute_retry_scenario() {
    let gateway = Gateway::new();

    // Credential C1 requests a quote for 10,000 XAF.
    let q1 = gateway
        .quotes
        .create_quote(
            &gateway.credential,
            TransactionType::Collection,
            "mtn_momo",
            Amount::from_minor_units(10_000),
            "XAF",
        )
        .await
        .unwrap();
    assert_eq!(q1.expires_at, q1.created_at + QUOTE_TTL_SECS);

    // Execute with quote_id=Q1, idempotency_key=K1 succeeds and consumes Q1.
    let first = gateway.execute_collect(&q1.id, "K1").await.unwrap();
    assert_eq!(first.status, "succeeded");
    assert_eq!(first.quote_id.as_deref(), Some(q1.id.as_str()));

    let stored = gateway
        .quotes
        .get(Environment::Production, &gateway.credential.id, &q1.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.consumed_at.is_some());

    // A retried execute with the same key, even pointing at a different
    // quote, returns the original result unchanged and leaves the second
    // quote untouched.
    let q2 = gateway
        .quotes
        .create_quote(
            &gateway.credential,
            TransactionType::Collection,
            "mtn_momo",
            Amount::from_minor_units(5_000),
            "XAF",
        )
        .await
        .unwrap();
    let retried = gateway.execute_collect(&q2.id, "K1").await.unwrap();
    assert_eq!(retried, first);

    let q2_after = gateway
        .quotes
        .get(Environment::Production, &gateway.credential.id, &q2.id)
        .await
        .unwrap()
        .unwrap();
    assert!(
        q2_after.consumed_at.is_none(),
        "the memoized retry must not touch the second quote"
    );

    // A fresh execute reusing Q1 under a new idempotency key fails: the
    // quote is already spent.
    let err = gateway.execute_collect(&q1.id, "K2").await.unwrap_err();
    assert_eq!(err, LedgerError::QuoteAlreadyConsumed { id: q1.id.clone() });
}

#[tokio::test]
async fn expired_quote_cannot_be_executed() {
    let gateway = Gateway::new();

    let quote = gateway
        .quotes
        .create_quote(
            &gateway.credential,
            TransactionType::Collection,
            "orange_money",
            Amount::from_minor_units(2_500),
            "XAF",
        )
        .await
        .unwrap();

    gateway.clock.advance(QUOTE_TTL_SECS);
    let err = gateway.execute_collect(&quote.id, "K-late").await.unwrap_err();
    assert_eq!(err, LedgerError::QuoteExpired { id: quote.id });

    // The failed attempt cleared its idempotency marker, so the client can
    // retry the same key against a fresh quote... but the error itself is
    // terminal for the old quote.
    let fresh = gateway
        .quotes
        .create_quote(
            &gateway.credential,
            TransactionType::Collection,
            "orange_money",
            Amount::from_minor_units(2_500),
            "XAF",
        )
        .await
        .unwrap();
    let outcome = gateway.execute_collect(&fresh.id, "K-late").await.unwrap();
    assert_eq!(outcome.status, "succeeded");
}
