//! Notification channel for status changes and failures

use std::sync::Arc;

use tracing::{error, info, warn};

use super::classifier::ErrorClassifier;
use super::error::{FailureKind, TransactionError};
use super::state::TransactionStatus;
use super::types::Transaction;

/// Receives lifecycle events. Implementations must not block for long:
/// they run while the transaction's account locks may still be held.
pub trait TransactionObserver: Send + Sync {
    fn on_status_changed(
        &self,
        _tx: &Transaction,
        _from: Option<TransactionStatus>,
        _to: TransactionStatus,
    ) {
    }

    /// `recorded` is the terminal status written for the failure, or `None`
    /// if the failure left the record untouched.
    fn on_failure(
        &self,
        _tx: &Transaction,
        _error: &TransactionError,
        _recorded: Option<TransactionStatus>,
    ) {
    }
}

/// Writes every event to the tracing log
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl TransactionObserver for LoggingObserver {
    fn on_status_changed(
        &self,
        tx: &Transaction,
        from: Option<TransactionStatus>,
        to: TransactionStatus,
    ) {
        info!(
            tx_id = tx.id,
            from = from.map(|s| s.as_str()).unwrap_or("UNSET"),
            to = to.as_str(),
            "Transaction status changed"
        );
    }

    fn on_failure(
        &self,
        tx: &Transaction,
        err: &TransactionError,
        recorded: Option<TransactionStatus>,
    ) {
        let status = recorded.map(|s| s.as_str()).unwrap_or("UNCHANGED");
        match err.kind() {
            FailureKind::Validation
            | FailureKind::Conflict
            | FailureKind::InsufficientFunds
            | FailureKind::Request => {
                warn!(tx_id = tx.id, code = err.code(), status, error = %err, "Transaction rejected");
            }
            FailureKind::LockAcquisition => {
                warn!(
                    tx_id = tx.id,
                    code = err.code(),
                    status,
                    retriable = ErrorClassifier::is_retriable(err),
                    error = %err,
                    "Transaction lock contention"
                );
            }
            FailureKind::LockRelease | FailureKind::Interrupted | FailureKind::Unexpected => {
                error!(tx_id = tx.id, code = err.code(), status, error = %err, "Transaction system failure");
            }
        }
    }
}

/// Fan-out to registered observers
#[derive(Clone, Default)]
pub struct Observers {
    observers: Vec<Arc<dyn TransactionObserver>>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Arc<dyn TransactionObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn status_changed(
        &self,
        tx: &Transaction,
        from: Option<TransactionStatus>,
        to: TransactionStatus,
    ) {
        for o in &self.observers {
            o.on_status_changed(tx, from, to);
        }
    }

    pub fn failure(
        &self,
        tx: &Transaction,
        error: &TransactionError,
        recorded: Option<TransactionStatus>,
    ) {
        for o in &self.observers {
            o.on_failure(tx, error, recorded);
        }
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.observers.len())
            .finish()
    }
}
