//! Per-path advisory locks for destructive operations
//!
//! The engine guarantees at most one in-flight destructive operation
//! (delete, move, overwrite) per canonical path. Locks are created lazily
//! and removed again once uncontended, so the registry stays proportional
//! to the number of concurrently-locked paths, not the workspace size.
//! Read-only operations never touch this registry.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize on the given canonical path. The returned guard must be
    /// held for the whole backup+operation window.
    pub async fn acquire(&self, key: String) -> PathGuard<'_> {
        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.clone().lock_owned().await;
        PathGuard {
            registry: self,
            key,
            lock,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}

pub struct PathGuard<'a> {
    registry: &'a LockRegistry,
    key: String,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Registry entry + our clone = 2 strong refs means nobody else is
        // holding or waiting on this lock; drop it from the map. The
        // re-check inside remove_if runs under the shard lock.
        if Arc::strong_count(&self.lock) == 2 {
            self.registry
                .locks
                .remove_if(&self.key, |_, v| Arc::strong_count(v) == 2);
        }
    }
}
