//! Transaction Status State Machine
//!
//! ```text
//! NEW → PENDING → DONE
//!  │       │
//!  └───────┴──→ INSUFFICIENT_FUNDS | VALIDATION_ERROR | EXECUTION_ERROR | SYSTEM_ERROR
//! ```
//!
//! Terminal states: DONE and the four failure states.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Coarse grouping of statuses for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCategory {
    Processing,
    Success,
    Faulty,
}

/// Transaction status
///
/// State IDs are stable for storage. Success is positive, failures negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum TransactionStatus {
    /// Registered, not yet picked up
    New = 0,

    /// Picked up by the lifecycle coordinator
    Pending = 10,

    /// Terminal: applied
    Done = 40,

    /// Terminal: source balance did not cover the amount
    InsufficientFunds = -10,

    /// Terminal: malformed or conflicting transaction
    ValidationError = -20,

    /// Terminal: locks could not be acquired (operator may resubmit)
    ExecutionError = -30,

    /// Terminal: interruption, lock table corruption or storage fault
    SystemError = -40,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 7] = [
        TransactionStatus::New,
        TransactionStatus::Pending,
        TransactionStatus::Done,
        TransactionStatus::InsufficientFunds,
        TransactionStatus::ValidationError,
        TransactionStatus::ExecutionError,
        TransactionStatus::SystemError,
    ];

    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::New | TransactionStatus::Pending)
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.category() == StatusCategory::Faulty
    }

    pub fn category(&self) -> StatusCategory {
        match self {
            TransactionStatus::New | TransactionStatus::Pending => StatusCategory::Processing,
            TransactionStatus::Done => StatusCategory::Success,
            TransactionStatus::InsufficientFunds
            | TransactionStatus::ValidationError
            | TransactionStatus::ExecutionError
            | TransactionStatus::SystemError => StatusCategory::Faulty,
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// - terminal states never change
    /// - a status never transitions to itself
    /// - NEW → PENDING
    /// - NEW | PENDING → any failure state
    /// - PENDING → DONE only
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        if self.is_terminal() || *self == next {
            return false;
        }
        match next {
            TransactionStatus::New => false,
            TransactionStatus::Pending => *self == TransactionStatus::New,
            TransactionStatus::Done => *self == TransactionStatus::Pending,
            _ => next.is_failed(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::New => "NEW",
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Done => "DONE",
            TransactionStatus::InsufficientFunds => "INSUFFICIENT_FUNDS",
            TransactionStatus::ValidationError => "VALIDATION_ERROR",
            TransactionStatus::ExecutionError => "EXECUTION_ERROR",
            TransactionStatus::SystemError => "SYSTEM_ERROR",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TransactionStatus::New => "New",
            TransactionStatus::Pending => "Pending",
            TransactionStatus::Done => "Done",
            TransactionStatus::InsufficientFunds => "Insufficient funds",
            TransactionStatus::ValidationError => "Validation error",
            TransactionStatus::ExecutionError => "Execution error",
            TransactionStatus::SystemError => "System error",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown transaction status: {s}"))
    }
}
