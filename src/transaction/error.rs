//! Transaction Error Types

use rust_decimal::Decimal;
use thiserror::Error;

use super::state::TransactionStatus;
use crate::account::AccountError;
use crate::core_types::{AccountId, TransactionId};
use crate::iban::IbanError;
use crate::locking::LockError;

/// Failure taxonomy used for status classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Malformed input
    Validation,
    /// Disallowed same-account transfer
    Conflict,
    /// Business rule: balance does not cover the debit
    InsufficientFunds,
    /// Expected contention/timeout
    LockAcquisition,
    /// Releasing a lock that is not held (bug signal)
    LockRelease,
    /// Lock wait cancelled
    Interrupted,
    /// Anything else, e.g. storage faults
    Unexpected,
    /// Caller error that never touches the transaction (not found,
    /// already processed, ...)
    Request,
}

/// Transaction engine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    // === Validation Errors ===
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Source and destination account must differ: {account_id}")]
    Conflict { account_id: AccountId },

    #[error(
        "Insufficient funds in account {account_id}: available {available}, requested {requested}"
    )]
    InsufficientFunds {
        account_id: AccountId,
        available: Decimal,
        requested: Decimal,
    },

    #[error("IBAN error: {0}")]
    Iban(#[from] IbanError),

    // === Locking Errors ===
    #[error(transparent)]
    Lock(#[from] LockError),

    // === Request Errors ===
    #[error("Transaction not found: {0}")]
    NotFound(TransactionId),

    #[error("Transaction {id} already processed with status {status}")]
    AlreadyProcessed {
        id: TransactionId,
        status: TransactionStatus,
    },

    #[error("Transaction {id} cannot be processed in status {status}")]
    InvalidState { id: TransactionId, status: String },

    #[error("Transaction {id} cannot be deleted in status {status}")]
    DeletionForbidden { id: TransactionId, status: String },

    // === System Errors ===
    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl TransactionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            TransactionError::Validation(_) | TransactionError::Iban(_) => FailureKind::Validation,
            TransactionError::Conflict { .. } => FailureKind::Conflict,
            TransactionError::InsufficientFunds { .. } => FailureKind::InsufficientFunds,
            TransactionError::Lock(LockError::Release { .. }) => FailureKind::LockRelease,
            TransactionError::Lock(e) if e.is_interrupted() => FailureKind::Interrupted,
            TransactionError::Lock(_) => FailureKind::LockAcquisition,
            TransactionError::NotFound(_)
            | TransactionError::AlreadyProcessed { .. }
            | TransactionError::InvalidState { .. }
            | TransactionError::DeletionForbidden { .. } => FailureKind::Request,
            TransactionError::Repository(_) | TransactionError::Unexpected(_) => {
                FailureKind::Unexpected
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            TransactionError::Validation(_) => "VALIDATION_ERROR",
            TransactionError::Conflict { .. } => "CONFLICT",
            TransactionError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            TransactionError::Iban(e) => e.code(),
            TransactionError::Lock(e) => e.code(),
            TransactionError::NotFound(_) => "TRANSACTION_NOT_FOUND",
            TransactionError::AlreadyProcessed { .. } => "ALREADY_PROCESSED",
            TransactionError::InvalidState { .. } => "INVALID_STATE",
            TransactionError::DeletionForbidden { .. } => "DELETION_FORBIDDEN",
            TransactionError::Repository(_) => "REPOSITORY_ERROR",
            TransactionError::Unexpected(_) => "UNEXPECTED_ERROR",
        }
    }
}

impl From<AccountError> for TransactionError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::InsufficientFunds {
                account_id,
                available,
                requested,
            } => TransactionError::InsufficientFunds {
                account_id,
                available,
                requested,
            },
            AccountError::NotFound(_)
            | AccountError::IbanNotFound { .. }
            | AccountError::InvalidAmount(_) => TransactionError::Validation(e.to_string()),
            AccountError::Overflow(_) => TransactionError::Unexpected(e.to_string()),
            AccountError::Storage(msg) => TransactionError::Repository(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_error_kinds() {
        let timeout = TransactionError::from(LockError::Acquisition {
            resource_id: 1,
            attempts: 5,
            total_wait_ms: 900,
            interrupted: false,
        });
        let interrupted = TransactionError::from(LockError::Acquisition {
            resource_id: 1,
            attempts: 1,
            total_wait_ms: 0,
            interrupted: true,
        });
        let release = TransactionError::from(LockError::Release { resource_id: 1 });

        assert_eq!(timeout.kind(), FailureKind::LockAcquisition);
        assert_eq!(interrupted.kind(), FailureKind::Interrupted);
        assert_eq!(release.kind(), FailureKind::LockRelease);
        assert_eq!(release.code(), "LOCK_RELEASE_FAILED");
    }

    #[test]
    fn test_account_error_conversion() {
        let e = TransactionError::from(AccountError::InsufficientFunds {
            account_id: 3,
            available: Decimal::ONE,
            requested: Decimal::TEN,
        });
        assert_eq!(e.kind(), FailureKind::InsufficientFunds);

        let e = TransactionError::from(AccountError::NotFound(7));
        assert_eq!(e.kind(), FailureKind::Validation);
        assert!(e.to_string().contains('7'));

        let e = TransactionError::from(AccountError::Storage("disk".into()));
        assert_eq!(e, TransactionError::Repository("disk".into()));
        assert_eq!(e.kind(), FailureKind::Unexpected);
    }

    #[test]
    fn test_request_kinds() {
        assert_eq!(TransactionError::NotFound(1).kind(), FailureKind::Request);
        let e = TransactionError::DeletionForbidden {
            id: 1,
            status: "DONE".into(),
        };
        assert_eq!(e.kind(), FailureKind::Request);
        assert_eq!(e.code(), "DELETION_FORBIDDEN");
    }
}
