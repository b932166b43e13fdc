//! The global reconciliation lock.
//!
//! Held for the whole of a bulk run and while a decision prompt is open.
//! Change events that arrive while it is held are dropped, not queued: the
//! holder's own writes leave documents in their final state, and any later
//! edit produces a fresh event.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable handle; every clone observes the same lock.
#[derive(Debug, Clone, Default)]
pub struct ReconcileLock {
    held: Arc<AtomicBool>,
}

impl ReconcileLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Take the lock, or `None` when someone already holds it.
    pub fn try_acquire(&self) -> Option<LockGuard> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LockGuard {
                held: Arc::clone(&self.held),
            })
    }
}

/// Releases the lock on drop.
#[derive(Debug)]
pub struct LockGuard {
    held: Arc<AtomicBool>,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_guard_drops() {
        let lock = ReconcileLock::new();
        let guard = lock.try_acquire().expect("first acquire");
        assert!(lock.is_held());
        assert!(lock.try_acquire().is_none());
        drop(guard);
        assert!(!lock.is_held());
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn clones_share_state() {
        let lock = ReconcileLock::new();
        let observer = lock.clone();
        let _guard = lock.try_acquire().expect("acquire");
        assert!(observer.is_held());
    }
}
