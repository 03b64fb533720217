//! Account Error Types

use rust_decimal::Decimal;
use thiserror::Error;

use crate::core_types::AccountId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("Account not found: {0}")]
    NotFound(AccountId),

    #[error("No account with IBAN {masked}")]
    IbanNotFound { masked: String },

    #[error(
        "Insufficient funds in account {account_id}: available {available}, requested {requested}"
    )]
    InsufficientFunds {
        account_id: AccountId,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Amount must be greater than zero: {0}")]
    InvalidAmount(Decimal),

    #[error("Balance overflow in account {0}")]
    Overflow(AccountId),

    #[error("Account storage error: {0}")]
    Storage(String),
}

impl AccountError {
    pub fn code(&self) -> &'static str {
        match self {
            AccountError::NotFound(_) => "ACCOUNT_NOT_FOUND",
            AccountError::IbanNotFound { .. } => "IBAN_NOT_FOUND",
            AccountError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            AccountError::InvalidAmount(_) => "INVALID_AMOUNT",
            AccountError::Overflow(_) => "OVERFLOW",
            AccountError::Storage(_) => "STORAGE_ERROR",
        }
    }
}
