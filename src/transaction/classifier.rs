//! Error Classifier
//!
//! Single mapping from failure kind to terminal status.
//!
//! | Kind | Status |
//! |------|--------|
//! | Validation, Conflict | VALIDATION_ERROR |
//! | InsufficientFunds | INSUFFICIENT_FUNDS |
//! | LockAcquisition | EXECUTION_ERROR |
//! | Interrupted, LockRelease, Unexpected | SYSTEM_ERROR |

use super::error::{FailureKind, TransactionError};
use super::state::TransactionStatus;

#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Terminal status recorded for `error`.
    ///
    /// `Request` failures never reach a stored transaction; they classify as
    /// VALIDATION_ERROR for reporting only.
    pub fn classify(error: &TransactionError) -> TransactionStatus {
        match error.kind() {
            FailureKind::Validation | FailureKind::Conflict | FailureKind::Request => {
                TransactionStatus::ValidationError
            }
            FailureKind::InsufficientFunds => TransactionStatus::InsufficientFunds,
            FailureKind::LockAcquisition => TransactionStatus::ExecutionError,
            FailureKind::LockRelease | FailureKind::Interrupted | FailureKind::Unexpected => {
                TransactionStatus::SystemError
            }
        }
    }

    /// Contention failures an operator may resubmit
    pub fn is_retriable(error: &TransactionError) -> bool {
        Self::classify(error) == TransactionStatus::ExecutionError
    }
}
