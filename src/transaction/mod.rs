//! Transactions
//!
//! Registration, validation and execution of money movements between
//! accounts.
//!
//! # State Machine
//!
//! ```text
//!            claim (CAS)            execute ok
//!   NEW ───────────────▶ PENDING ───────────────▶ DONE
//!                          │
//!                          │ classified failure
//!                          ▼
//!   INSUFFICIENT_FUNDS | VALIDATION_ERROR | EXECUTION_ERROR | SYSTEM_ERROR
//! ```
//!
//! Every status after PENDING is terminal. Only NEW (or never-set)
//! transactions can be processed or deleted.
//!
//! # Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`TransactionService`] | Public facade: register, process, query, delete |
//! | [`TransactionLifecycleCoordinator`] | Claim, lock, validate, execute, record |
//! | [`TransactionValidator`] | Shape and account-level business rules |
//! | [`StrategyRegistry`] | One balance-mutation routine per type |
//! | [`ErrorClassifier`] | Maps failures to terminal statuses |
//! | [`TransactionObserver`] | Status change and failure notifications |

pub mod classifier;
pub mod coordinator;
pub mod error;
pub mod observer;
pub mod repository;
pub mod service;
pub mod state;
pub mod strategy;
pub mod types;
pub mod validator;


pub use classifier::ErrorClassifier;
pub use coordinator::TransactionLifecycleCoordinator;
pub use error::{FailureKind, TransactionError};
pub use observer::{LoggingObserver, Observers, TransactionObserver};
pub use repository::{InMemoryTransactionRepository, TransactionRepository};
pub use service::{BatchReport, EngineConfig, IbanTransfer, TransactionService};
pub use state::{StatusCategory, TransactionStatus};
pub use strategy::{ExecutionContext, ExecutionStrategy, StrategyRegistry};
pub use types::{Transaction, TransactionType, TypeCategory};
pub use validator::{TransactionValidator, ValidationInput};
