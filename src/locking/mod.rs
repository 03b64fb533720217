//! Account Locking
//!
//! In-process pessimistic locking for account balances.
//!
//! # Architecture
//!
//! ```text
//! TransactionLifecycleCoordinator
//!          │ acquire(from, to)
//!          ▼
//! AccountLockCoordinator ── retry + backoff ──▶ LockRegistry (DashMap<AccountId, ResourceLock>)
//!          │
//!          ▼
//!    AccountLocks (guard, released explicitly or on Drop)
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Lower Id First**: pairs are always locked in ascending id order
//! 2. **Balanced Accounting**: every successful acquisition is released exactly once
//! 3. **No Swallowed Failures**: lock errors always reach the caller

pub mod config;
pub mod coordinator;
pub mod error;
pub mod registry;
pub mod signal;

pub use config::{LockingConfig, LockingSettings};
pub use coordinator::{AccountLockCoordinator, AccountLocks, LockStats, LockStatsSnapshot};
pub use error::LockError;
pub use registry::{LockRegistry, ResourceLock, TryLockOutcome, compute_backoff};
pub use signal::CancellationSignal;
