//! bankcore - Banking Transaction Engine
//!
//! Deadlock-free account locking and transaction execution for retail
//! banking: deposits, withdrawals, three tiers of transfers and fees.
//!
//! # Modules
//!
//! - [`core_types`] - Core type definitions (AccountId, OwnerId, TransactionId)
//! - [`locking`] - Resource lock table, backoff and ordered pair locking
//! - [`iban`] - IBAN parsing, masking, generation and transfer tier analysis
//! - [`account`] - Account model and storage port
//! - [`transaction`] - Validation, strategies, lifecycle state machine and service
//! - [`config`] - YAML application config
//! - [`logging`] - tracing subscriber setup
//! - [`csv_io`] - CSV loading/saving for the batch binary

// Core types - must be first!
pub mod core_types;

pub mod account;
pub mod iban;
pub mod locking;
pub mod transaction;

// Ambient
pub mod config;
pub mod csv_io;
pub mod logging;

// Convenient re-exports at crate root
pub use account::{Account, AccountError, AccountProvider, InMemoryAccountStore};
pub use core_types::{AccountId, HOUSE_ACCOUNT_ID, OwnerId, TransactionId};
pub use iban::{Iban, IbanAnalyzer, IbanError, IbanGenerator, TransferCategory};
pub use locking::{
    AccountLockCoordinator, AccountLocks, CancellationSignal, LockError, LockRegistry,
    LockStatsSnapshot, LockingConfig,
};
pub use transaction::{
    BatchReport, EngineConfig, ErrorClassifier, FailureKind, InMemoryTransactionRepository,
    Transaction, TransactionError, TransactionLifecycleCoordinator, TransactionObserver,
    TransactionRepository, TransactionService, TransactionStatus, TransactionType,
};
