//! Atomic key-value storage seam.
//!
//! The replay cache, quote ledger, and idempotency store all reduce to two
//! conditional writes: insert-if-absent and compare-and-swap. The trait keeps
//! the protocol deployable on any shared store that offers them (Redis
//! `SET NX`, DynamoDB conditional puts, SQL upserts); the in-memory
//! implementation serves tests and single-process deployments.
//!
//! Keys follow `{environment}:{namespace}:{credential_id}:{rest}` so sandbox
//! and production state is disjoint by construction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use zito_protocol::clock::ClockSource;
use zito_protocol::Environment;

use crate::{LedgerError, Result};

/// Build a namespaced store key.
pub fn store_key(
    environment: Environment,
    namespace: &str,
    credential_id: &str,
    rest: &str,
) -> String {
    format!("{}:{}:{}:{}", environment, namespace, credential_id, rest)
}

/// Shared key-value store with atomic conditional writes.
///
/// # Security
///
/// `insert_if_absent` and `compare_and_swap` MUST be atomic: the replay
/// cache, quote consumption, and idempotent execution all depend on exactly
/// one writer winning a race. Separate check-then-write steps reintroduce
/// the double-spend races this crate exists to close.
#[async_trait]
pub trait AtomicKvStore: Send + Sync {
    /// Insert `value` under `key` only if the key is absent (or its previous
    /// record has expired). Returns true when this call created the record.
    async fn insert_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl_secs: Option<i64>,
    ) -> Result<bool>;

    /// Replace the value under `key` only if the current value equals
    /// `expected`. Returns true when the swap happened.
    async fn compare_and_swap(&self, key: &str, expected: &[u8], new: Vec<u8>) -> Result<bool>;

    /// Fetch the live value under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove the record under `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<i64>,
}

impl Entry {
    fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }
}

/// In-memory store with lazy TTL expiry.
///
/// A single mutex guards the map, so both conditional writes are trivially
/// atomic. Expired entries are treated as absent on every read and reaped
/// opportunistically.
pub struct InMemoryKvStore {
    clock: Arc<dyn ClockSource>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryKvStore {
    /// Create an empty store reading time from `clock`.
    pub fn new(clock: Arc<dyn ClockSource>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Create a store wrapped in an `Arc` for sharing.
    pub fn new_shared(clock: Arc<dyn ClockSource>) -> Arc<Self> {
        Arc::new(Self::new(clock))
    }

    /// Drop every expired entry now. Lazy expiry makes this optional; it
    /// bounds memory between reads of cold keys.
    pub fn sweep(&self) -> Result<usize> {
        let now = self.clock.now_unix();
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before - entries.len())
    }

    /// Number of live entries (expired-but-unswept records excluded).
    pub fn len(&self) -> usize {
        let now = self.clock.now_unix();
        self.entries
            .lock()
            .map(|entries| entries.values().filter(|e| !e.is_expired(now)).count())
            .unwrap_or(0)
    }

    /// True when no live entries remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|e| LedgerError::Storage(format!("lock poisoned: {}", e)))
    }
}

#[async_trait]
impl AtomicKvStore for InMemoryKvStore {
    async fn insert_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl_secs: Option<i64>,
    ) -> Result<bool> {
        let now = self.clock.now_unix();
        let mut entries = self.lock()?;
        if let Some(existing) = entries.get(key) {
            if !existing.is_expired(now) {
                return Ok(false);
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: ttl_secs.map(|ttl| now + ttl),
            },
        );
        Ok(true)
    }

    async fn compare_and_swap(&self, key: &str, expected: &[u8], new: Vec<u8>) -> Result<bool> {
        let now = self.clock.now_unix();
        let mut entries = self.lock()?;
        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) && entry.value == expected => {
                entry.value = new;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = self.clock.now_unix();
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zito_protocol::clock::ManualClock;

    fn store_at(now: i64) -> (Arc<ManualClock>, InMemoryKvStore) {
        let clock = Arc::new(ManualClock::new(now));
        let store = InMemoryKvStore::new(clock.clone());
        (clock, store)
    }

    #[tokio::test]
    async fn insert_if_absent_is_first_writer_wins() {
        let (_, store) = store_at(1_000);
        assert!(store.insert_if_absent("k", b"a".to_vec(), None).await.unwrap());
        assert!(!store.insert_if_absent("k", b"b".to_vec(), None).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(b"a".to_vec()));
    }

    #[tokio::test]
    async fn expired_records_read_as_absent() {
        let (clock, store) = store_at(1_000);
        store
            .insert_if_absent("k", b"a".to_vec(), Some(600))
            .await
            .unwrap();
        clock.advance(599);
        assert!(store.get("k").await.unwrap().is_some());

        clock.advance(1);
        assert!(store.get("k").await.unwrap().is_none());
        // The slot may be reused.
        assert!(store.insert_if_absent("k", b"b".to_vec(), None).await.unwrap());
    }

    #[tokio::test]
    async fn compare_and_swap_requires_exact_match() {
        let (_, store) = store_at(1_000);
        store.insert_if_absent("k", b"a".to_vec(), None).await.unwrap();

        assert!(!store.compare_and_swap("k", b"x", b"b".to_vec()).await.unwrap());
        assert!(store.compare_and_swap("k", b"a", b"b".to_vec()).await.unwrap());
        // The old value is gone; a second identical swap loses.
        assert!(!store.compare_and_swap("k", b"a", b"c".to_vec()).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(b"b".to_vec()));
    }

    #[tokio::test]
    async fn sweep_reaps_expired_entries() {
        let (clock, store) = store_at(1_000);
        store
            .insert_if_absent("old", b"a".to_vec(), Some(10))
            .await
            .unwrap();
        store
            .insert_if_absent("live", b"b".to_vec(), Some(600))
            .await
            .unwrap();

        clock.advance(11);
        assert_eq!(store.sweep().unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("live").await.unwrap().is_some());
    }

    #[test]
    fn keys_are_environment_scoped() {
        let sandbox = store_key(Environment::Sandbox, "nonce", "zito_pk_1", "n-1");
        let production = store_key(Environment::Production, "nonce", "zito_pk_1", "n-1");
        assert_eq!(sandbox, "sandbox:nonce:zito_pk_1:n-1");
        assert_ne!(sandbox, production);
    }
}
