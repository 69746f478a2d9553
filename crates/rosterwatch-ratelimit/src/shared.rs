//! A limiter that can be cloned into concurrently running handlers.

use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::MixedRateLimiter;

/// Cheaply cloneable handle to one [`MixedRateLimiter`].
///
/// Every operation takes the lock once, so a check and its commit can
/// never interleave with another caller's. The lock is a plain
/// `std::sync::Mutex`: it is never held across an `.await`.
#[derive(Debug)]
pub struct SharedRateLimiter<K> {
    inner: Arc<Mutex<MixedRateLimiter<K>>>,
}

impl<K> Clone for SharedRateLimiter<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Hash + Eq + Clone> SharedRateLimiter<K> {
    pub fn new(limiter: MixedRateLimiter<K>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(limiter)),
        }
    }

    /// Admits and records the event if every window allows it.
    pub fn try_accept(&self, key: &K) -> bool {
        self.lock().try_accept(key)
    }

    pub fn try_accept_at(&self, now: Instant, key: &K) -> bool {
        self.lock().try_accept_at(now, key)
    }

    /// Whether an event would be admitted now. The answer may be stale by
    /// the time the caller acts on it; use `try_accept` to act.
    pub fn is_allowed(&self, key: &K) -> bool {
        self.lock().is_allowed(key)
    }

    pub fn purge_idle(&self, now: Instant) -> usize {
        self.lock().purge_idle(now)
    }

    pub fn tracked_keys(&self) -> usize {
        self.lock().tracked_keys()
    }

    // A panic while holding the lock cannot leave the windows
    // inconsistent, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, MixedRateLimiter<K>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;
    use crate::WindowSpec;

    #[test]
    fn test_concurrent_try_accept_never_over_admits() {
        let limiter = SharedRateLimiter::new(
            MixedRateLimiter::new()
                .with_global(WindowSpec::new(25, 3600.0))
                .unwrap(),
        );
        let admitted = Arc::new(AtomicUsize::new(0));
        let now = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let limiter = limiter.clone();
                let admitted = Arc::clone(&admitted);
                thread::spawn(move || {
                    for _ in 0..100 {
                        if limiter.try_accept_at(now, &t) {
                            admitted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::Relaxed), 25);
    }

    #[test]
    fn test_clones_share_state() {
        let a = SharedRateLimiter::new(
            MixedRateLimiter::new()
                .with_per_key(WindowSpec::new(1, 60.0))
                .unwrap(),
        );
        let b = a.clone();

        assert!(a.try_accept(&"u"));
        assert!(!b.try_accept(&"u"));
        assert_eq!(b.tracked_keys(), 1);
    }
}
