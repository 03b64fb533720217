//! Transaction Validator
//!
//! Pre-execution checks. Never mutates anything; every failure is a value.

use rust_decimal::Decimal;

use super::error::TransactionError;
use super::types::{Transaction, TransactionType, TypeCategory};
use crate::account::Account;

/// Punctuation allowed in titles besides letters, digits and whitespace
pub const TITLE_PUNCTUATION: &[char] = &['.', ',', '/', '?', '@', '!', '%', '#', '&', '(', ')', '-'];

/// Transaction plus the account snapshots loaded for it.
///
/// `source`/`destination` are `None` when the transaction does not reference
/// that side or when the referenced account could not be loaded.
#[derive(Debug, Clone, Copy)]
pub struct ValidationInput<'a> {
    pub transaction: &'a Transaction,
    pub source: Option<&'a Account>,
    pub destination: Option<&'a Account>,
}

impl<'a> ValidationInput<'a> {
    pub fn new(
        transaction: &'a Transaction,
        source: Option<&'a Account>,
        destination: Option<&'a Account>,
    ) -> Self {
        Self {
            transaction,
            source,
            destination,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionValidator;

impl TransactionValidator {
    pub fn new() -> Self {
        Self
    }

    /// Full validation against loaded account state
    ///
    /// # Validation Rules
    /// - every check of [`TransactionValidator::validate_shape`]
    /// - every referenced account was loaded
    /// - TRANSFER_OWN: both accounts have the same owner
    /// - debits (withdrawal, transfer, fee): source balance >= amount
    pub fn validate(&self, input: &ValidationInput<'_>) -> Result<(), TransactionError> {
        let tx = input.transaction;
        let (tx_type, amount) = self.validate_shape(tx)?;

        if let Some(id) = tx.source
            && input.source.is_none()
        {
            return Err(TransactionError::Validation(format!(
                "source account {id} not found"
            )));
        }
        if let Some(id) = tx.destination
            && input.destination.is_none()
        {
            return Err(TransactionError::Validation(format!(
                "destination account {id} not found"
            )));
        }

        if tx_type == TransactionType::TransferOwn
            && let (Some(src), Some(dst)) = (input.source, input.destination)
            && src.owner_id() != dst.owner_id()
        {
            return Err(TransactionError::Validation(format!(
                "own transfer between accounts of different owners ({} -> {})",
                src.id(),
                dst.id()
            )));
        }

        if tx_type.debits_source()
            && let Some(src) = input.source
            && !src.can_cover(amount)
        {
            return Err(TransactionError::InsufficientFunds {
                account_id: src.id(),
                available: src.balance(),
                requested: amount,
            });
        }

        Ok(())
    }

    /// Predicate form of [`TransactionValidator::validate`]
    pub fn is_valid(&self, input: &ValidationInput<'_>) -> bool {
        self.validate(input).is_ok()
    }

    /// Checks that need no account state; used at registration time.
    ///
    /// # Validation Rules
    /// - amount present and > 0
    /// - type present
    /// - title non-empty, letters/digits/whitespace/[`TITLE_PUNCTUATION`] only
    /// - account presence per category: deposit → destination,
    ///   withdrawal and fee → source, transfer → both
    /// - non-OWN transfers: source != destination (`Conflict`)
    pub fn validate_shape(
        &self,
        tx: &Transaction,
    ) -> Result<(TransactionType, Decimal), TransactionError> {
        let amount = match tx.amount {
            Some(a) if a > Decimal::ZERO => a,
            Some(a) => {
                return Err(TransactionError::Validation(format!(
                    "amount must be greater than zero, got {a}"
                )));
            }
            None => return Err(TransactionError::Validation("amount is missing".into())),
        };

        let tx_type = tx
            .transaction_type
            .ok_or_else(|| TransactionError::Validation("transaction type is missing".into()))?;

        validate_title(&tx.title)?;

        match tx_type.category() {
            TypeCategory::Deposit if tx.destination.is_none() => {
                return Err(TransactionError::Validation(
                    "deposit requires a destination account".into(),
                ));
            }
            TypeCategory::Withdrawal | TypeCategory::Fee if tx.source.is_none() => {
                return Err(TransactionError::Validation(format!(
                    "{} requires a source account",
                    tx_type.display_name()
                )));
            }
            TypeCategory::Transfer if tx.source.is_none() || tx.destination.is_none() => {
                return Err(TransactionError::Validation(
                    "transfer requires source and destination accounts".into(),
                ));
            }
            _ => {}
        }

        if tx_type.is_transfer()
            && tx_type != TransactionType::TransferOwn
            && let Some(src) = tx.source
            && tx.destination == Some(src)
        {
            return Err(TransactionError::Conflict { account_id: src });
        }

        Ok((tx_type, amount))
    }
}

/// Title rule: non-empty, letters (any script), ASCII digits, whitespace
/// and `. , / ? @ ! % # & ( ) -`
pub fn validate_title(title: &str) -> Result<(), TransactionError> {
    if title.trim().is_empty() {
        return Err(TransactionError::Validation("title is empty".into()));
    }
    if let Some(bad) = title.chars().find(|c| !is_title_char(*c)) {
        return Err(TransactionError::Validation(format!(
            "title contains illegal character {bad:?}"
        )));
    }
    Ok(())
}

fn is_title_char(c: char) -> bool {
    c.is_alphabetic() || c.is_ascii_digit() || c.is_whitespace() || TITLE_PUNCTUATION.contains(&c)
}
