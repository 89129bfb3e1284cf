//! Per-key pessimistic locking for ledger transactions
//!
//! A transaction names every document and pool key it will touch, then
//! acquires all of them in a global order before reading state. Two
//! transactions touching disjoint keys never wait on each other.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use shared::PoolKey;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Prune idle lock entries once the table grows past this size
const PRUNE_THRESHOLD: usize = 4096;

/// Something a transaction can lock
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    Item(Uuid),
    Warehouse(Uuid),
    Party(Uuid),
    /// Every price row of one item
    Price(Uuid),
    Order(Uuid),
    Purchase(Uuid),
    Booking(Uuid),
    Sale(Uuid),
    TotalSale(Uuid),
    CreditNote(Uuid),
    Pool(PoolKey),
}

impl std::fmt::Display for LockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockKey::Item(id) => write!(f, "item:{}", id),
            LockKey::Warehouse(id) => write!(f, "warehouse:{}", id),
            LockKey::Party(id) => write!(f, "party:{}", id),
            LockKey::Price(item_id) => write!(f, "price:{}", item_id),
            LockKey::Order(id) => write!(f, "order:{}", id),
            LockKey::Purchase(id) => write!(f, "purchase:{}", id),
            LockKey::Booking(id) => write!(f, "booking:{}", id),
            LockKey::Sale(id) => write!(f, "sale:{}", id),
            LockKey::TotalSale(id) => write!(f, "total_sale:{}", id),
            LockKey::CreditNote(id) => write!(f, "credit_note:{}", id),
            LockKey::Pool(key) => write!(f, "pool:{}", key),
        }
    }
}

/// Lock acquisition failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LockError {
    #[error("could not lock {key} after {attempts} attempts")]
    Timeout { key: String, attempts: u32 },
}

/// Retry behavior for lock acquisition
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// How long to wait on a single key before giving up the attempt
    pub lock_timeout: Duration,
    /// Maximum number of acquisition attempts
    pub max_attempts: u32,
    /// Base delay between attempts (doubled each retry)
    pub base_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(2000),
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl LockConfig {
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Guards for every key of one transaction, released on drop
#[derive(Debug)]
pub struct LockSet {
    keys: BTreeSet<LockKey>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl LockSet {
    pub fn keys(&self) -> &BTreeSet<LockKey> {
        &self.keys
    }

    pub fn holds(&self, key: &LockKey) -> bool {
        self.keys.contains(key)
    }
}

/// Table of per-key mutexes
#[derive(Debug, Default)]
pub struct LockManager {
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
    config: LockConfig,
}

impl LockManager {
    pub fn new(config: LockConfig) -> Self {
        Self {
            locks: DashMap::new(),
            config,
        }
    }

    fn mutex_for(&self, key: &LockKey) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquire every key in ascending order.
    ///
    /// A timeout on any key drops the guards already held and retries the
    /// whole set after a backoff delay.
    pub async fn acquire<I>(&self, keys: I) -> Result<LockSet, LockError>
    where
        I: IntoIterator<Item = LockKey>,
    {
        let keys: BTreeSet<LockKey> = keys.into_iter().collect();
        self.prune();

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_acquire(&keys).await {
                Ok(guards) => {
                    return Ok(LockSet {
                        keys,
                        _guards: guards,
                    })
                }
                Err(blocked) if attempt < self.config.max_attempts => {
                    let delay = self.config.delay_for(attempt);
                    tracing::debug!(
                        key = %blocked,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Lock busy, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(blocked) => {
                    tracing::warn!(key = %blocked, attempts = attempt, "Lock acquisition failed");
                    return Err(LockError::Timeout {
                        key: blocked.to_string(),
                        attempts: attempt,
                    });
                }
            }
        }
    }

    async fn try_acquire(
        &self,
        keys: &BTreeSet<LockKey>,
    ) -> Result<Vec<OwnedMutexGuard<()>>, LockKey> {
        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            let mutex = self.mutex_for(key);
            match tokio::time::timeout(self.config.lock_timeout, mutex.lock_owned()).await {
                Ok(guard) => guards.push(guard),
                Err(_) => return Err(key.clone()),
            }
        }
        Ok(guards)
    }

    /// Drop entries nobody holds or waits on
    fn prune(&self) {
        if self.locks.len() > PRUNE_THRESHOLD {
            self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> LockConfig {
        LockConfig {
            lock_timeout: Duration::from_millis(20),
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_disjoint_keys_do_not_block() {
        let manager = LockManager::new(fast_config());
        let a = manager
            .acquire(vec![LockKey::Order(Uuid::from_u128(1))])
            .await
            .unwrap();
        let b = manager
            .acquire(vec![LockKey::Order(Uuid::from_u128(2))])
            .await
            .unwrap();
        assert!(a.holds(&LockKey::Order(Uuid::from_u128(1))));
        assert!(b.holds(&LockKey::Order(Uuid::from_u128(2))));
    }

    #[tokio::test]
    async fn test_held_key_times_out() {
        let manager = LockManager::new(fast_config());
        let key = LockKey::Booking(Uuid::from_u128(7));
        let _held = manager.acquire(vec![key.clone()]).await.unwrap();

        let err = manager.acquire(vec![key]).await.unwrap_err();
        assert!(matches!(err, LockError::Timeout { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_release_on_drop() {
        let manager = LockManager::new(fast_config());
        let key = LockKey::Sale(Uuid::from_u128(3));
        {
            let _held = manager.acquire(vec![key.clone()]).await.unwrap();
        }
        assert!(manager.acquire(vec![key]).await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_keys_collapse() {
        let manager = LockManager::new(fast_config());
        let key = LockKey::Order(Uuid::from_u128(5));
        let set = manager
            .acquire(vec![key.clone(), key.clone()])
            .await
            .unwrap();
        assert_eq!(set.keys().len(), 1);
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = fast_config();
        assert_eq!(config.delay_for(1), Duration::from_millis(1));
        assert_eq!(config.delay_for(2), Duration::from_millis(2));
        assert_eq!(config.delay_for(10), Duration::from_millis(5));
    }
}
