//! Resource Lock Table
//!
//! One reentrant lock per resource id, created lazily and never removed.
//! The permanent cost is one small entry per distinct account ever touched.

use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use rand::Rng;

use super::config::LockingConfig;
use super::signal::CancellationSignal;
use crate::core_types::AccountId;

/// How often a blocked waiter re-checks the cancellation signal
pub(crate) const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Result of a bounded acquisition attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryLockOutcome {
    Acquired,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Default)]
struct Ownership {
    owner: Option<ThreadId>,
    holds: u32,
}

/// Reentrant, thread-owned lock for a single resource id.
///
/// Unlike a scoped mutex guard, ownership is explicit: the thread that
/// acquired the lock must call [`ResourceLock::unlock`] once per successful
/// acquisition. This lets the coordinator lock and unlock across function
/// boundaries while still detecting releases by a non-owner.
#[derive(Debug, Default)]
pub struct ResourceLock {
    state: Mutex<Ownership>,
    available: Condvar,
}

impl ResourceLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to acquire the lock, waiting at most `timeout`.
    ///
    /// Re-entry by the owning thread always succeeds immediately. A raised
    /// `signal` aborts the wait (and is checked before waiting at all).
    pub fn try_lock_for(&self, timeout: Duration, signal: &CancellationSignal) -> TryLockOutcome {
        let me = thread::current().id();
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();

        loop {
            if signal.is_cancelled() {
                return TryLockOutcome::Cancelled;
            }

            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.holds = 1;
                    return TryLockOutcome::Acquired;
                }
                Some(owner) if owner == me => {
                    state.holds += 1;
                    return TryLockOutcome::Acquired;
                }
                Some(_) => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return TryLockOutcome::TimedOut;
            }
            let slice = (deadline - now).min(CANCEL_POLL_INTERVAL);
            self.available.wait_for(&mut state, slice);
        }
    }

    /// Release one hold. Returns `false` if the calling thread is not the owner.
    pub fn unlock(&self) -> bool {
        let me = thread::current().id();
        let mut state = self.state.lock();

        if state.owner != Some(me) || state.holds == 0 {
            return false;
        }

        state.holds -= 1;
        if state.holds == 0 {
            state.owner = None;
            drop(state);
            self.available.notify_one();
        }
        true
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        self.state.lock().owner == Some(thread::current().id())
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().owner.is_some()
    }

    /// Number of outstanding holds by the current owner (0 if free)
    pub fn hold_count(&self) -> u32 {
        self.state.lock().holds
    }
}

/// Registry mapping resource ids to their locks.
///
/// Constructed explicitly and injected into the coordinator, so tests can
/// run with isolated registries.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: DashMap<AccountId, Arc<ResourceLock>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the lock for `resource_id`, creating it on first reference
    pub fn get_or_create(&self, resource_id: AccountId) -> Arc<ResourceLock> {
        self.locks.entry(resource_id).or_default().value().clone()
    }

    /// Get the lock only if it has been created before
    pub fn get(&self, resource_id: AccountId) -> Option<Arc<ResourceLock>> {
        self.locks.get(&resource_id).map(|entry| entry.value().clone())
    }

    /// Number of distinct resources ever locked
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exponential backoff with ±25% jitter:
/// `min(max_delay, base_delay * 2^attempt) ± 25%`, never negative.
pub fn compute_backoff(attempt: u32, config: &LockingConfig) -> Duration {
    compute_backoff_with(attempt, config, &mut rand::thread_rng())
}

/// [`compute_backoff`] with a caller-supplied random source
pub fn compute_backoff_with<R: Rng + ?Sized>(
    attempt: u32,
    config: &LockingConfig,
    rng: &mut R,
) -> Duration {
    let base_ms = config.base_delay().as_millis() as u64;
    let max_ms = config.max_delay().as_millis() as u64;

    let exponential = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    let delay_ms = max_ms.min(exponential) as i64;

    let jitter_ms = delay_ms / 4;
    let offset = if jitter_ms > 0 {
        rng.gen_range(-jitter_ms..=jitter_ms)
    } else {
        0
    };

    Duration::from_millis((delay_ms + offset).max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_registry_returns_same_lock() {
        let registry = LockRegistry::new();
        assert!(registry.is_empty());

        let a = registry.get_or_create(1);
        let b = registry.get_or_create(1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);

        registry.get_or_create(2);
        assert_eq!(registry.len(), 2);
        assert!(registry.get(3).is_none());
    }

    #[test]
    fn test_reentrant_acquire_and_release() {
        let lock = ResourceLock::new();
        let signal = CancellationSignal::new();

        assert_eq!(
            lock.try_lock_for(Duration::from_millis(10), &signal),
            TryLockOutcome::Acquired
        );
        assert_eq!(
            lock.try_lock_for(Duration::from_millis(10), &signal),
            TryLockOutcome::Acquired
        );
        assert_eq!(lock.hold_count(), 2);
        assert!(lock.is_held_by_current_thread());

        assert!(lock.unlock());
        assert!(lock.is_locked());
        assert!(lock.unlock());
        assert!(!lock.is_locked());

        // nothing left to release
        assert!(!lock.unlock());
    }

    #[test]
    fn test_other_thread_times_out_and_cannot_unlock() {
        let lock = Arc::new(ResourceLock::new());
        let signal = CancellationSignal::new();
        assert_eq!(
            lock.try_lock_for(Duration::from_millis(10), &signal),
            TryLockOutcome::Acquired
        );

        let contender = Arc::clone(&lock);
        let handle = thread::spawn(move || {
            let signal = CancellationSignal::new();
            let outcome = contender.try_lock_for(Duration::from_millis(30), &signal);
            let unlocked = contender.unlock();
            (outcome, unlocked)
        });

        let (outcome, unlocked) = handle.join().unwrap();
        assert_eq!(outcome, TryLockOutcome::TimedOut);
        assert!(!unlocked);
        assert!(lock.unlock());
    }

    #[test]
    fn test_waiter_acquires_after_release() {
        let lock = Arc::new(ResourceLock::new());
        let signal = CancellationSignal::new();
        assert_eq!(
            lock.try_lock_for(Duration::from_millis(10), &signal),
            TryLockOutcome::Acquired
        );

        let contender = Arc::clone(&lock);
        let handle = thread::spawn(move || {
            let signal = CancellationSignal::new();
            let outcome = contender.try_lock_for(Duration::from_secs(2), &signal);
            assert!(contender.unlock());
            outcome
        });

        thread::sleep(Duration::from_millis(50));
        assert!(lock.unlock());
        assert_eq!(handle.join().unwrap(), TryLockOutcome::Acquired);
    }

    #[test]
    fn test_cancelled_wait_returns_promptly() {
        let lock = Arc::new(ResourceLock::new());
        let holder_signal = CancellationSignal::new();
        assert_eq!(
            lock.try_lock_for(Duration::from_millis(10), &holder_signal),
            TryLockOutcome::Acquired
        );

        let signal = CancellationSignal::new();
        let waiter_signal = signal.clone();
        let contender = Arc::clone(&lock);
        let handle = thread::spawn(move || {
            let start = Instant::now();
            let outcome = contender.try_lock_for(Duration::from_secs(5), &waiter_signal);
            (outcome, start.elapsed())
        });

        thread::sleep(Duration::from_millis(30));
        signal.cancel();

        let (outcome, elapsed) = handle.join().unwrap();
        assert_eq!(outcome, TryLockOutcome::Cancelled);
        assert!(elapsed < Duration::from_secs(2), "waited {:?}", elapsed);
        assert!(lock.unlock());
    }

    #[test]
    fn test_backoff_within_jitter_bounds() {
        let config = LockingConfig::new(5, 100, 2000, 200);
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..200 {
            // attempt 1: 100 * 2 = 200 ms ± 50
            let d = compute_backoff_with(1, &config, &mut rng).as_millis();
            assert!((150..=250).contains(&d), "attempt 1 gave {}", d);

            // attempt 10: capped at 2000 ms ± 500
            let d = compute_backoff_with(10, &config, &mut rng).as_millis();
            assert!((1500..=2500).contains(&d), "attempt 10 gave {}", d);
        }
    }

    #[test]
    fn test_backoff_saturates_on_huge_attempt() {
        let config = LockingConfig::new(5, 100, 2000, 200);
        let d = compute_backoff(u32::MAX, &config);
        assert!(d <= Duration::from_millis(2500));
    }

    #[test]
    fn test_backoff_tiny_delay_is_not_negative() {
        let config = LockingConfig::new(5, 1, 1, 1);
        let mut rng = StdRng::seed_from_u64(7);
        for attempt in 0..10 {
            // 1 ms has no jitter room; the result is exactly 1 ms
            assert_eq!(
                compute_backoff_with(attempt, &config, &mut rng),
                Duration::from_millis(1)
            );
        }
    }
}
