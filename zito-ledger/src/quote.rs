//! Short-lived, single-use price quotes.
//!
//! A quote locks the fee numbers for one future transaction: created on the
//! price request, valid for exactly fifteen minutes, and consumable exactly
//! once by the execute call that references it. Consumption is a
//! compare-and-swap on the stored record, so two racing execute calls cannot
//! both spend the same quote. A consumed quote's numbers are immutable and
//! authoritative; re-pricing never happens after consumption, even if the
//! fee schedule changes moments later.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zito_protocol::clock::ClockSource;
use zito_protocol::{Credential, Environment};

use crate::amount::Amount;
use crate::store::{store_key, AtomicKvStore};
use crate::{LedgerError, Result};

/// Quote validity window: exactly fifteen minutes from creation.
pub const QUOTE_TTL_SECS: i64 = 900;

/// How long an expired quote stays readable (so execute calls against it can
/// report `quote_expired` rather than `quote_not_found`) before eviction.
pub const ARCHIVE_GRACE_SECS: i64 = 900;

const NAMESPACE: &str = "quote";

/// Direction of the money movement a quote prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Money in: a payer funds the merchant wallet.
    Collection,
    /// Money out: the merchant pays a recipient.
    Disbursement,
}

impl TransactionType {
    /// Wire form of the variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collection => "COLLECTION",
            Self::Disbursement => "DISBURSEMENT",
        }
    }
}

/// Fee split between the processing gateway and the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    /// Fee retained by the upstream gateway.
    pub gateway_fee: Amount,
    /// Fee retained by the platform.
    pub platform_fee: Amount,
}

impl FeeBreakdown {
    /// Combined fee; `None` on overflow.
    pub fn total(&self) -> Option<Amount> {
        self.gateway_fee.checked_add(&self.platform_fee)
    }
}

/// A priced, time-boxed, single-use transaction lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Quote id returned to the caller as `quote_id`.
    pub id: String,
    /// Credential the quote is scoped to.
    pub credential_id: String,
    /// Environment the quote lives in.
    pub environment: Environment,
    /// Direction of the priced movement.
    pub transaction_type: TransactionType,
    /// Upstream gateway the price was computed for.
    pub gateway: String,
    /// Requested principal amount.
    pub amount: Amount,
    /// ISO currency code.
    pub currency: String,
    /// Frozen fee split.
    pub fees: FeeBreakdown,
    /// Amount the payer is charged (collection) or the merchant wallet is
    /// debited (disbursement).
    pub total_amount: Amount,
    /// Amount credited to the merchant after fees.
    pub net_to_merchant: Amount,
    /// Creation time, Unix seconds.
    pub created_at: i64,
    /// `created_at + 900`, exactly.
    pub expires_at: i64,
    /// Set once, by the first successful execute call.
    pub consumed_at: Option<i64>,
}

impl Quote {
    /// True when `now` is past the validity window. A quote is consumable up
    /// to but not including `expires_at`.
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

/// Fee schedule lookup, typically backed by a per-gateway pricing table
/// outside this crate.
pub trait FeeSchedule: Send + Sync {
    /// Compute the fee split for one prospective transaction.
    fn fees(
        &self,
        gateway: &str,
        transaction_type: TransactionType,
        amount: &Amount,
        currency: &str,
    ) -> Result<FeeBreakdown>;
}

/// Basis-point schedule applying one rate pair to every gateway. Enough for
/// tests and sandbox deployments.
#[derive(Debug, Clone, Copy)]
pub struct FlatFeeSchedule {
    /// Gateway share in basis points.
    pub gateway_bps: i64,
    /// Platform share in basis points.
    pub platform_bps: i64,
}

impl FeeSchedule for FlatFeeSchedule {
    fn fees(
        &self,
        _gateway: &str,
        _transaction_type: TransactionType,
        amount: &Amount,
        _currency: &str,
    ) -> Result<FeeBreakdown> {
        Ok(FeeBreakdown {
            gateway_fee: amount.bps(self.gateway_bps),
            platform_fee: amount.bps(self.platform_bps),
        })
    }
}

/// Issues and consumes quotes over the atomic store.
pub struct QuoteLedger {
    store: Arc<dyn AtomicKvStore>,
    fees: Arc<dyn FeeSchedule>,
    clock: Arc<dyn ClockSource>,
}

impl QuoteLedger {
    /// Create a ledger.
    pub fn new(
        store: Arc<dyn AtomicKvStore>,
        fees: Arc<dyn FeeSchedule>,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        Self { store, fees, clock }
    }

    /// Price a prospective transaction and persist the resulting quote.
    ///
    /// Collection: the payer covers the principal, fees come out of the
    /// merchant's credit (`total = amount`, `net = amount - fees`).
    /// Disbursement: the merchant wallet covers principal plus fees
    /// (`total = amount + fees`, `net = amount`).
    pub async fn create_quote(
        &self,
        credential: &Credential,
        transaction_type: TransactionType,
        gateway: &str,
        amount: Amount,
        currency: &str,
    ) -> Result<Quote> {
        let fees = self
            .fees
            .fees(gateway, transaction_type, &amount, currency)?;
        let fee_total = fees.total().ok_or(LedgerError::Overflow)?;

        let (total_amount, net_to_merchant) = match transaction_type {
            TransactionType::Collection => (
                amount,
                amount.checked_sub(&fee_total).ok_or(LedgerError::Overflow)?,
            ),
            TransactionType::Disbursement => (
                amount.checked_add(&fee_total).ok_or(LedgerError::Overflow)?,
                amount,
            ),
        };

        let created_at = self.clock.now_unix();
        let quote = Quote {
            id: Uuid::new_v4().to_string(),
            credential_id: credential.id.clone(),
            environment: credential.environment,
            transaction_type,
            gateway: gateway.to_string(),
            amount,
            currency: currency.to_string(),
            fees,
            total_amount,
            net_to_merchant,
            created_at,
            expires_at: created_at + QUOTE_TTL_SECS,
            consumed_at: None,
        };

        let key = store_key(
            credential.environment,
            NAMESPACE,
            &credential.id,
            &quote.id,
        );
        let created = self
            .store
            .insert_if_absent(
                &key,
                serde_json::to_vec(&quote)?,
                Some(QUOTE_TTL_SECS + ARCHIVE_GRACE_SECS),
            )
            .await?;
        if !created {
            // UUID collision would be the store lying to us.
            return Err(LedgerError::Storage(format!(
                "quote id collision: {}",
                quote.id
            )));
        }

        tracing::debug!(
            quote_id = %quote.id,
            credential = %credential.id,
            environment = %credential.environment,
            "quote created"
        );
        Ok(quote)
    }

    /// Fetch a quote without touching its consumption state.
    pub async fn get(
        &self,
        environment: Environment,
        credential_id: &str,
        quote_id: &str,
    ) -> Result<Option<Quote>> {
        let key = store_key(environment, NAMESPACE, credential_id, quote_id);
        match self.store.get(&key).await? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Atomically consume a quote: the `unconsumed → consumed` transition
    /// happens exactly once.
    ///
    /// Expiry is checked before consumption state, so an execute call against
    /// a dead quote always reports `quote_expired`. The loser of a
    /// consumption race re-reads and reports `quote_already_consumed`.
    pub async fn consume(
        &self,
        environment: Environment,
        credential_id: &str,
        quote_id: &str,
    ) -> Result<Quote> {
        let key = store_key(environment, NAMESPACE, credential_id, quote_id);
        loop {
            let raw = self.store.get(&key).await?.ok_or(LedgerError::QuoteNotFound {
                id: quote_id.to_string(),
            })?;
            let quote: Quote = serde_json::from_slice(&raw)?;

            let now = self.clock.now_unix();
            if quote.is_expired(now) {
                return Err(LedgerError::QuoteExpired {
                    id: quote_id.to_string(),
                });
            }
            if quote.consumed_at.is_some() {
                return Err(LedgerError::QuoteAlreadyConsumed {
                    id: quote_id.to_string(),
                });
            }

            let mut consumed = quote;
            consumed.consumed_at = Some(now);
            if self
                .store
                .compare_and_swap(&key, &raw, serde_json::to_vec(&consumed)?)
                .await?
            {
                tracing::debug!(quote_id = %quote_id, "quote consumed");
                return Ok(consumed);
            }
            // Lost the race; the next read observes the winner's write.
        }
    }
}
