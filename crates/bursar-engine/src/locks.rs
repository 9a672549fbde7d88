//! # Keyed Locks
//!
//! Per-key async mutexes serializing read-modify-write cycles.
//!
//! The payment engine is safe to run concurrently against *different* fees,
//! but two payments against the *same* fee must not interleave: both would
//! read the same installment state and the second commit would overwrite the
//! first. Each fee id maps to one mutex; holding it makes the fee's
//! installment set a critical section.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A map of independently lockable keys.
///
/// Cheap to clone: clones share the same lock table.
#[derive(Debug, Clone, Default)]
pub struct KeyedLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KeyedLocks {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `key`, creating it on first use.
    ///
    /// The guard is owned, so it can be held across await points for the
    /// duration of a payment request. The table itself is only locked long
    /// enough to look up the entry; waiting happens on the per-key mutex.
    ///
    /// Idle entries are swept here: a slot whose only strong reference is
    /// the table itself has no holder and no waiter, so the table stays
    /// proportional to the keys currently in flight rather than every key
    /// ever seen.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut table = self.inner.lock().await;
            table.retain(|_, slot| Arc::strong_count(slot) > 1);
            table
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        slot.lock_owned().await
    }

    /// Number of keys currently tracked.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// Whether no key is currently tracked.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
