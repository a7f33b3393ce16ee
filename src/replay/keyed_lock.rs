//! Per-Key Mutual Exclusion
//!
//! [`KeyedLock`] hands out one async mutex per key, created on first use.
//! It backs the keyed-lock replay strategy, where individual entries (not
//! whole sessions) are shared between workers and each worker locks the
//! entry's connection before touching its session.
//!
//! ## Caveat
//!
//! A per-key lock gives mutual exclusion, not ordering. If two entries of
//! the same connection are picked up by two workers at about the same time,
//! whichever worker wins the lock runs first, which is not necessarily the
//! one holding the earlier entry. Use it only when the replayed workload
//! does not depend on statement order within a session.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A map of lazily created per-key mutexes, each guarding a value.
#[derive(Debug)]
pub struct KeyedLock<K, V> {
    slots: StdMutex<HashMap<K, Arc<Mutex<V>>>>,
}

impl<K, V> Default for KeyedLock<K, V> {
    fn default() -> Self {
        Self {
            slots: StdMutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, V> KeyedLock<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the mutex for `key`, creating it with `init` if absent.
    ///
    /// The map itself is only locked for the lookup, never while waiting
    /// on a key's mutex.
    pub fn slot(&self, key: &K, init: impl FnOnce() -> V) -> Arc<Mutex<V>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(init()))),
        )
    }

    /// Waits for exclusive access to the value under `key`.
    pub async fn lock(&self, key: &K, init: impl FnOnce() -> V) -> OwnedMutexGuard<V> {
        self.slot(key, init).lock_owned().await
    }

    /// Removes the mutex for `key`. Holders of the old mutex keep their
    /// guard; later callers get a fresh value.
    pub fn remove(&self, key: &K) -> Option<Arc<Mutex<V>>> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    /// Removes and returns every value whose mutex is no longer referenced
    /// elsewhere.
    pub fn drain(&self) -> Vec<V> {
        let slots = std::mem::take(&mut *self.slots.lock().unwrap_or_else(PoisonError::into_inner));
        slots
            .into_values()
            .filter_map(|slot| Arc::try_unwrap(slot).ok())
            .map(Mutex::into_inner)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks: Arc<KeyedLock<u64, Vec<u32>>> = Arc::new(KeyedLock::new());

        let guard = locks.lock(&1, Vec::new).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let mut value = locks.lock(&1, Vec::new).await;
                value.push(2);
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        let mut guard = guard;
        guard.push(1);
        drop(guard);

        contender.await.unwrap();
        assert_eq!(*locks.lock(&1, Vec::new).await, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks: KeyedLock<u64, ()> = KeyedLock::new();

        let _a = locks.lock(&1, || ()).await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.lock(&2, || ())).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_init_runs_once_per_key() {
        let locks: KeyedLock<&str, u32> = KeyedLock::new();

        *locks.lock(&"a", || 10).await += 1;
        *locks.lock(&"a", || 100).await += 1;
        assert_eq!(*locks.lock(&"a", || 0).await, 12);

        locks.remove(&"a");
        assert_eq!(*locks.lock(&"a", || 7).await, 7);
    }

    #[tokio::test]
    async fn test_drain() {
        let locks: KeyedLock<u64, u64> = KeyedLock::new();
        for key in 0..3 {
            *locks.lock(&key, || 0).await = key * 10;
        }

        let mut values = locks.drain();
        values.sort();
        assert_eq!(values, vec![0, 10, 20]);
        assert!(locks.is_empty());
    }
}
