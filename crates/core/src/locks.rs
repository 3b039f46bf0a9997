//! Named mutex registry.
//!
//! A [`MutexRegistry`] hands out one async mutex per key, created lazily on
//! first use. It is created once at startup and shared by `Arc` with every
//! component that needs to serialize work against the same backend object.
//! Different lock domains share a registry by using different key roots.
//!
//! Locks are released when the returned [`LockGuard`] is dropped, so every
//! exit path of a critical section releases the slot, panics included.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::OwnedMutexGuard;
use tracing::trace;

/// A composite lock key of the form `<root>/<component>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey(String);

impl LockKey {
    /// Join `root` and `component` with `/`.
    pub fn join(root: &str, component: &str) -> Self {
        Self(format!("{}/{}", root, component))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Process-wide table of named locks.
#[derive(Default)]
pub struct MutexRegistry {
    slots: Mutex<HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl MutexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until the lock for `key` is free, then take it.
    pub async fn acquire(&self, key: &LockKey) -> LockGuard {
        let slot = self.slot(key);
        trace!(key = %key, "waiting for lock");
        let guard = slot.lock_owned().await;
        trace!(key = %key, "lock acquired");
        LockGuard {
            key: key.clone(),
            _guard: guard,
        }
    }

    /// Take the lock for `key` only if nobody holds it right now.
    pub fn try_acquire(&self, key: &LockKey) -> Option<LockGuard> {
        let slot = self.slot(key);
        slot.try_lock_owned().ok().map(|guard| LockGuard {
            key: key.clone(),
            _guard: guard,
        })
    }

    /// Give the lock back. Equivalent to dropping the guard.
    pub fn release(&self, guard: LockGuard) {
        drop(guard);
    }

    /// Whether the lock for `key` is currently held.
    pub fn is_locked(&self, key: &LockKey) -> bool {
        self.try_acquire(key).is_none()
    }

    fn slot(&self, key: &LockKey) -> Arc<tokio::sync::Mutex<()>> {
        self.slots()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    // Recover from poisoning: the map only holds `Arc`s, so a panic while it
    // was held cannot leave it inconsistent.
    fn slots(&self) -> MutexGuard<'_, HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>> {
        self.slots.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("lock registry mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

/// Holds a registry slot until dropped.
pub struct LockGuard {
    key: LockKey,
    _guard: OwnedMutexGuard<()>,
}

impl LockGuard {
    pub fn key(&self) -> &LockKey {
        &self.key
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        trace!(key = %self.key, "lock released");
    }
}
