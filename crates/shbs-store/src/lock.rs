//! Per-offset cooperative mutual exclusion, with a shutdown flag that
//! unblocks every pending and future locker, and an ascending-order
//! multi-slot acquisition helper that the store engine and cleaner
//! both use to avoid deadlocking against each other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

/// Guards a single locked slot offset; releases on drop.
pub struct SlotGuard<'a> {
    manager: &'a LockManager,
    offset: u64,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.manager.unlock(self.offset);
    }
}

/// Tracks which slot offsets are currently held, with a condvar to wake
/// waiters on release or shutdown.
struct Inner {
    held: HashMap<u64, ()>,
}

/// Per-offset mutual exclusion over an (unbounded) space of slot
/// offsets. One `LockManager` is shared by all of a store's foreground
/// operations and its cleaner.
pub struct LockManager {
    inner: Mutex<Inner>,
    cv: Condvar,
    shutdown: AtomicBool,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager {
    /// A fresh lock manager with nothing held.
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { held: HashMap::new() }), cv: Condvar::new(), shutdown: AtomicBool::new(false) }
    }

    /// Block until `offset` is free, then mark it held. Returns `None`
    /// if shutdown has started.
    pub fn lock_slot(&self, offset: u64) -> Option<SlotGuard<'_>> {
        if self.shutdown.load(Ordering::Acquire) {
            return None;
        }
        let mut guard = self.inner.lock().expect("lock manager mutex poisoned");
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                return None;
            }
            if !guard.held.contains_key(&offset) {
                guard.held.insert(offset, ());
                return Some(SlotGuard { manager: self, offset });
            }
            guard = self.cv.wait(guard).expect("lock manager mutex poisoned");
        }
    }

    fn unlock(&self, offset: u64) {
        let mut guard = self.inner.lock().expect("lock manager mutex poisoned");
        guard.held.remove(&offset);
        drop(guard);
        self.cv.notify_all();
    }

    /// Lock every offset in `offsets` in ascending order, deduplicating
    /// first (candidate offsets are already unique per key, but a
    /// caller may combine current- and previous-capacity candidate
    /// sets during resize, which can overlap). Returns `None` if
    /// shutdown starts before all locks are acquired; any locks already
    /// taken are released via `Drop` before returning.
    pub fn lock_ascending(&self, offsets: &[u64]) -> Option<Vec<SlotGuard<'_>>> {
        let mut sorted = offsets.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for offset in sorted {
            match self.lock_slot(offset) {
                Some(g) => guards.push(g),
                None => return None,
            }
        }
        Some(guards)
    }

    /// Begin shutdown: every blocked and future `lock_slot` call
    /// returns `None` from now on.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.cv.notify_all();
    }

    /// Whether shutdown has started.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn lock_then_unlock_allows_reacquire() {
        let lm = LockManager::new();
        {
            let _g = lm.lock_slot(5).unwrap();
        }
        let _g2 = lm.lock_slot(5).unwrap();
    }

    #[test]
    fn ascending_multi_lock_excludes_overlap() {
        let lm = Arc::new(LockManager::new());
        let _guards = lm.lock_ascending(&[3, 1, 2]).unwrap();

        let lm2 = lm.clone();
        let handle = thread::spawn(move || lm2.lock_slot(2).is_some());
        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished(), "slot 2 should still be held");
        drop(_guards);
        assert!(handle.join().unwrap());
    }

    #[test]
    fn shutdown_unblocks_pending_lockers() {
        let lm = Arc::new(LockManager::new());
        let _g = lm.lock_slot(1).unwrap();

        let lm2 = lm.clone();
        let handle = thread::spawn(move || lm2.lock_slot(1).is_none());
        thread::sleep(Duration::from_millis(50));
        lm.shutdown();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn shutdown_rejects_future_locks_immediately() {
        let lm = LockManager::new();
        lm.shutdown();
        assert!(lm.lock_slot(0).is_none());
    }

    #[test]
    fn ascending_dedup_does_not_self_deadlock() {
        let lm = LockManager::new();
        let guards = lm.lock_ascending(&[4, 4, 4]).unwrap();
        assert_eq!(guards.len(), 1);
    }
}
