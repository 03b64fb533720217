//! Account Lock Coordinator
//!
//! Orders and acquires/releases the resource locks for one or two accounts.
//!
//! # Deadlock freedom
//!
//! When two accounts are involved, the account with the LOWER id is always
//! locked first and released last. Because every transaction in the process
//! follows the same total order, no cycle of waiters can form. Do not replace
//! the ordering key (id) with anything else (hash, timestamp, ...): the proof
//! only holds for a single global total order.

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, warn};

use super::config::LockingConfig;
use super::error::LockError;
use super::registry::{
    CANCEL_POLL_INTERVAL, LockRegistry, TryLockOutcome, compute_backoff,
};
use super::signal::CancellationSignal;
use crate::core_types::AccountId;

/// Lock accounting. `locks_acquired == locks_released` whenever no
/// transaction is in flight.
#[derive(Debug, Default)]
pub struct LockStats {
    pub locks_acquired: AtomicU64,
    pub locks_released: AtomicU64,
    pub acquire_failures: AtomicU64,
    pub interrupted: AtomicU64,
}

impl LockStats {
    pub fn snapshot(&self) -> LockStatsSnapshot {
        LockStatsSnapshot {
            locks_acquired: self.locks_acquired.load(Ordering::SeqCst),
            locks_released: self.locks_released.load(Ordering::SeqCst),
            acquire_failures: self.acquire_failures.load(Ordering::SeqCst),
            interrupted: self.interrupted.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockStatsSnapshot {
    pub locks_acquired: u64,
    pub locks_released: u64,
    pub acquire_failures: u64,
    pub interrupted: u64,
}

impl LockStatsSnapshot {
    /// Locks currently held across all threads
    pub fn outstanding(&self) -> u64 {
        self.locks_acquired.saturating_sub(self.locks_released)
    }
}

impl std::fmt::Display for LockStatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Lock Stats: acquired={}, released={}, failures={}, interrupted={}",
            self.locks_acquired, self.locks_released, self.acquire_failures, self.interrupted
        )
    }
}

/// Orders, acquires and releases account locks
pub struct AccountLockCoordinator {
    registry: Arc<LockRegistry>,
    config: LockingConfig,
    signal: CancellationSignal,
    stats: LockStats,
}

impl AccountLockCoordinator {
    pub fn new(registry: Arc<LockRegistry>, config: LockingConfig) -> Self {
        Self::with_signal(registry, config, CancellationSignal::new())
    }

    pub fn with_signal(
        registry: Arc<LockRegistry>,
        config: LockingConfig,
        signal: CancellationSignal,
    ) -> Self {
        Self {
            registry,
            config,
            signal,
            stats: LockStats::default(),
        }
    }

    pub fn config(&self) -> &LockingConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<LockRegistry> {
        &self.registry
    }

    pub fn signal(&self) -> &CancellationSignal {
        &self.signal
    }

    pub fn stats(&self) -> LockStatsSnapshot {
        self.stats.snapshot()
    }

    /// Lock one or two accounts, lower id first.
    ///
    /// If the second acquisition fails, the first lock is released before the
    /// error is returned.
    pub fn lock_accounts(
        &self,
        from: Option<AccountId>,
        to: Option<AccountId>,
    ) -> Result<(), LockError> {
        match (from, to) {
            (Some(a), Some(b)) => {
                let (first, second) = if a < b { (a, b) } else { (b, a) };
                self.lock(first)?;
                if let Err(e) = self.lock(second) {
                    if let Err(release_err) = self.unlock(first) {
                        error!(
                            account_id = first,
                            error = %release_err,
                            "Failed to roll back first lock after second lock failed"
                        );
                    }
                    return Err(e);
                }
                Ok(())
            }
            (Some(id), None) | (None, Some(id)) => self.lock(id),
            (None, None) => Ok(()),
        }
    }

    /// Release one or two accounts, higher id first.
    ///
    /// Both releases are attempted even if the first one fails; the first
    /// error is returned.
    pub fn unlock_accounts(
        &self,
        from: Option<AccountId>,
        to: Option<AccountId>,
    ) -> Result<(), LockError> {
        match (from, to) {
            (Some(a), Some(b)) => {
                let (first, second) = if a > b { (a, b) } else { (b, a) };
                let first_result = self.unlock(first);
                let second_result = self.unlock(second);
                first_result.and(second_result)
            }
            (Some(id), None) | (None, Some(id)) => self.unlock(id),
            (None, None) => Ok(()),
        }
    }

    /// Acquire the lock for a single resource with bounded retries.
    ///
    /// Each attempt waits at most `timeout`; failed attempts are followed by
    /// an exponential backoff sleep. Cancellation aborts immediately.
    pub fn lock(&self, resource_id: AccountId) -> Result<(), LockError> {
        debug!(account_id = resource_id, "Attempting to acquire lock");
        let lock = self.registry.get_or_create(resource_id);
        let start = Instant::now();
        let max_attempts = self.config.max_attempts();

        let mut attempts = 0u32;
        while attempts < max_attempts {
            match lock.try_lock_for(self.config.timeout(), &self.signal) {
                TryLockOutcome::Acquired => {
                    self.stats.locks_acquired.fetch_add(1, Ordering::SeqCst);
                    debug!(
                        account_id = resource_id,
                        attempts = attempts + 1,
                        "Lock acquired"
                    );
                    return Ok(());
                }
                TryLockOutcome::Cancelled => {
                    return Err(self.interrupted(resource_id, attempts + 1, start));
                }
                TryLockOutcome::TimedOut => {}
            }

            attempts += 1;
            if attempts < max_attempts {
                let delay = compute_backoff(attempts, &self.config);
                debug!(
                    account_id = resource_id,
                    attempts,
                    backoff_ms = delay.as_millis() as u64,
                    "Lock busy, backing off"
                );
                if !self.sleep_unless_cancelled(delay) {
                    return Err(self.interrupted(resource_id, attempts, start));
                }
            }
        }

        let total_wait_ms = start.elapsed().as_millis() as u64;
        self.stats.acquire_failures.fetch_add(1, Ordering::SeqCst);
        error!(
            account_id = resource_id,
            attempts = max_attempts,
            total_wait_ms,
            "Failed to acquire lock after maximum attempts"
        );
        Err(LockError::Acquisition {
            resource_id,
            attempts: max_attempts,
            total_wait_ms,
            interrupted: false,
        })
    }

    /// Release one hold on the resource lock.
    ///
    /// Releasing a lock the calling thread does not hold is a programming
    /// error and is reported as [`LockError::Release`].
    pub fn unlock(&self, resource_id: AccountId) -> Result<(), LockError> {
        let released = self
            .registry
            .get(resource_id)
            .map(|lock| lock.unlock())
            .unwrap_or(false);

        if !released {
            error!(account_id = resource_id, "Release of a lock not held");
            return Err(LockError::Release { resource_id });
        }

        self.stats.locks_released.fetch_add(1, Ordering::SeqCst);
        debug!(account_id = resource_id, "Lock released");
        Ok(())
    }

    /// Lock the distinct accounts among `from`/`to` and return a guard that
    /// releases them. See [`AccountLocks`].
    pub fn acquire(
        &self,
        from: Option<AccountId>,
        to: Option<AccountId>,
    ) -> Result<AccountLocks<'_>, LockError> {
        let to = if from.is_some() && from == to { None } else { to };
        self.lock_accounts(from, to)?;

        let mut held: Vec<AccountId> = from.into_iter().chain(to).collect();
        held.sort_unstable();

        Ok(AccountLocks {
            coordinator: self,
            held,
            _not_send: PhantomData,
        })
    }

    fn interrupted(&self, resource_id: AccountId, attempts: u32, start: Instant) -> LockError {
        let total_wait_ms = start.elapsed().as_millis() as u64;
        self.stats.interrupted.fetch_add(1, Ordering::SeqCst);
        warn!(
            account_id = resource_id,
            attempts, total_wait_ms, "Lock acquisition interrupted"
        );
        LockError::Acquisition {
            resource_id,
            attempts,
            total_wait_ms,
            interrupted: true,
        }
    }

    /// Sleep for `delay`, waking early if cancelled. Returns `false` on cancel.
    fn sleep_unless_cancelled(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            if self.signal.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(CANCEL_POLL_INTERVAL));
        }
    }
}

/// Locks held for one transaction, in acquisition order (ascending id).
///
/// Call [`AccountLocks::release`] to release and observe errors. If the
/// guard is dropped first (early return, `?`, panic unwinding), `Drop`
/// releases whatever is still held and logs any failure, so an acquired
/// lock is never leaked.
///
/// Resource locks are owned by the acquiring thread, so the guard is `!Send`
/// and must be released on that thread:
///
/// ```compile_fail
/// use std::sync::Arc;
/// use bankcore::{AccountLockCoordinator, LockRegistry, LockingConfig};
///
/// let c = AccountLockCoordinator::new(Arc::new(LockRegistry::new()), LockingConfig::default());
/// let guard = c.acquire(Some(1), None).unwrap();
/// std::thread::scope(|s| {
///     s.spawn(move || drop(guard));
/// });
/// ```
#[must_use = "dropping the guard releases the locks immediately"]
pub struct AccountLocks<'a> {
    coordinator: &'a AccountLockCoordinator,
    held: Vec<AccountId>,
    _not_send: PhantomData<*const ()>,
}

impl AccountLocks<'_> {
    pub fn accounts(&self) -> &[AccountId] {
        &self.held
    }

    /// Release all held locks, higher id first
    pub fn release(mut self) -> Result<(), LockError> {
        self.release_held()
    }

    fn release_held(&mut self) -> Result<(), LockError> {
        let (from, to) = match self.held.as_slice() {
            [] => (None, None),
            [only] => (Some(*only), None),
            [low, high] => (Some(*low), Some(*high)),
            _ => unreachable!("AccountLocks holds at most two accounts"),
        };
        self.held.clear();
        self.coordinator.unlock_accounts(from, to)
    }
}

impl Drop for AccountLocks<'_> {
    fn drop(&mut self) {
        if self.held.is_empty() {
            return;
        }
        if let Err(e) = self.release_held() {
            error!(error = %e, "Failed to release account locks on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator(config: LockingConfig) -> AccountLockCoordinator {
        AccountLockCoordinator::new(Arc::new(LockRegistry::new()), config)
    }

    #[test]
    fn test_lock_and_unlock_pair() {
        let c = coordinator(LockingConfig::default());
        c.lock_accounts(Some(9), Some(3)).unwrap();

        let low = c.registry().get(3).unwrap();
        let high = c.registry().get(9).unwrap();
        assert!(low.is_held_by_current_thread());
        assert!(high.is_held_by_current_thread());

        c.unlock_accounts(Some(9), Some(3)).unwrap();
        assert!(!low.is_locked());
        assert!(!high.is_locked());

        let stats = c.stats();
        assert_eq!(stats.locks_acquired, 2);
        assert_eq!(stats.locks_released, 2);
        assert_eq!(stats.outstanding(), 0);
    }

    #[test]
    fn test_single_and_empty() {
        let c = coordinator(LockingConfig::default());
        c.lock_accounts(None, Some(4)).unwrap();
        assert!(c.registry().get(4).unwrap().is_locked());
        c.unlock_accounts(None, Some(4)).unwrap();

        c.lock_accounts(None, None).unwrap();
        c.unlock_accounts(None, None).unwrap();
        assert_eq!(c.stats().locks_acquired, 1);
    }

    #[test]
    fn test_unlock_not_held_is_release_error() {
        let c = coordinator(LockingConfig::default());
        let err = c.unlock(42).unwrap_err();
        assert_eq!(err, LockError::Release { resource_id: 42 });

        // held by another thread
        let c = Arc::new(c);
        let other = Arc::clone(&c);
        thread::spawn(move || other.lock(5).unwrap()).join().unwrap();
        assert!(matches!(c.unlock(5), Err(LockError::Release { resource_id: 5 })));
    }

    #[test]
    fn test_exhausted_attempts() {
        let c = Arc::new(coordinator(LockingConfig::new(3, 1, 2, 10)));
        c.lock(1).unwrap();

        let other = Arc::clone(&c);
        let err = thread::spawn(move || other.lock(1)).join().unwrap().unwrap_err();
        match err {
            LockError::Acquisition {
                resource_id,
                attempts,
                interrupted,
                ..
            } => {
                assert_eq!(resource_id, 1);
                assert_eq!(attempts, 3);
                assert!(!interrupted);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(c.stats().acquire_failures, 1);
        c.unlock(1).unwrap();
    }

    #[test]
    fn test_second_lock_failure_releases_first() {
        let c = Arc::new(coordinator(LockingConfig::new(2, 1, 2, 10)));
        c.lock(8).unwrap();

        let other = Arc::clone(&c);
        let (result, first_still_held) = thread::spawn(move || {
            let result = other.lock_accounts(Some(2), Some(8));
            let held = other.registry().get(2).unwrap().is_held_by_current_thread();
            (result, held)
        })
        .join()
        .unwrap();

        assert!(result.is_err());
        assert!(!first_still_held);
        assert!(!c.registry().get(2).unwrap().is_locked());
        c.unlock(8).unwrap();

        let stats = c.stats();
        assert_eq!(stats.locks_acquired, stats.locks_released);
    }

    #[test]
    fn test_cancelled_signal_interrupts() {
        let c = coordinator(LockingConfig::default());
        c.signal().cancel();
        let err = c.lock(1).unwrap_err();
        assert!(err.is_interrupted());
        assert_eq!(c.stats().interrupted, 1);
        // the signal is left raised for callers up the stack
        assert!(c.signal().is_cancelled());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let c = coordinator(LockingConfig::default());
        {
            let guard = c.acquire(Some(7), Some(2)).unwrap();
            assert_eq!(guard.accounts(), &[2, 7]);
        }
        assert!(!c.registry().get(2).unwrap().is_locked());
        assert!(!c.registry().get(7).unwrap().is_locked());
        assert_eq!(c.stats().outstanding(), 0);
    }

    #[test]
    fn test_guard_dedups_same_account() {
        let c = coordinator(LockingConfig::default());
        let guard = c.acquire(Some(3), Some(3)).unwrap();
        assert_eq!(guard.accounts(), &[3]);
        assert_eq!(c.registry().get(3).unwrap().hold_count(), 1);
        guard.release().unwrap();
        assert_eq!(c.stats().locks_released, 1);
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let c = coordinator(LockingConfig::default());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = c.acquire(Some(1), None).unwrap();
            panic!("strategy blew up");
        }));
        assert!(result.is_err());
        assert!(!c.registry().get(1).unwrap().is_locked());
        assert_eq!(c.stats().outstanding(), 0);
    }
}
