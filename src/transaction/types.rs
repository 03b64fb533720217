//! Transaction types

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::state::TransactionStatus;
use crate::core_types::{AccountId, TransactionId};

/// Which accounts a transaction type moves money between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeCategory {
    /// Credit to destination
    Deposit,
    /// Debit from source
    Withdrawal,
    /// Debit source, credit destination
    Transfer,
    /// Debit source, credit destination (house account by default)
    Fee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    TransferOwn,
    TransferInternal,
    TransferExternal,
    Fee,
}

impl TransactionType {
    pub const ALL: [TransactionType; 6] = [
        TransactionType::Deposit,
        TransactionType::Withdrawal,
        TransactionType::TransferOwn,
        TransactionType::TransferInternal,
        TransactionType::TransferExternal,
        TransactionType::Fee,
    ];

    pub fn category(&self) -> TypeCategory {
        match self {
            TransactionType::Deposit => TypeCategory::Deposit,
            TransactionType::Withdrawal => TypeCategory::Withdrawal,
            TransactionType::TransferOwn
            | TransactionType::TransferInternal
            | TransactionType::TransferExternal => TypeCategory::Transfer,
            TransactionType::Fee => TypeCategory::Fee,
        }
    }

    #[inline]
    pub fn is_transfer(&self) -> bool {
        self.category() == TypeCategory::Transfer
    }

    /// Whether executing this type debits the source account
    #[inline]
    pub fn debits_source(&self) -> bool {
        self.category() != TypeCategory::Deposit
    }

    /// Fee rate charged on top of the amount (0.01 = 1%)
    pub fn fee_rate(&self) -> Decimal {
        match self {
            TransactionType::TransferExternal => Decimal::new(1, 2),
            _ => Decimal::ZERO,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::TransferOwn => "TRANSFER_OWN",
            TransactionType::TransferInternal => "TRANSFER_INTERNAL",
            TransactionType::TransferExternal => "TRANSFER_EXTERNAL",
            TransactionType::Fee => "FEE",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "Deposit",
            TransactionType::Withdrawal => "Withdrawal",
            TransactionType::TransferOwn => "Own Account Transfer",
            TransactionType::TransferInternal => "Internal Transfer",
            TransactionType::TransferExternal => "External Transfer",
            TransactionType::Fee => "Fee",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    /// Accepts the canonical name (`TRANSFER_OWN`) or the display name
    /// (`Own Account Transfer`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s) || t.display_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown transaction type: {s}"))
    }
}

/// A money movement request and its processing state.
///
/// Optional fields model records that arrived incomplete; the validator
/// turns every missing field into a VALIDATION_ERROR instead of a panic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub source: Option<AccountId>,
    pub destination: Option<AccountId>,
    pub amount: Option<Decimal>,
    pub transaction_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// New unsaved transaction (id 0 until the repository assigns one)
    pub fn new(
        transaction_type: TransactionType,
        source: Option<AccountId>,
        destination: Option<AccountId>,
        amount: Decimal,
        title: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            source,
            destination,
            amount: Some(amount),
            transaction_type: Some(transaction_type),
            status: Some(TransactionStatus::New),
            title: title.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn deposit(destination: AccountId, amount: Decimal, title: impl Into<String>) -> Self {
        Self::new(TransactionType::Deposit, None, Some(destination), amount, title)
    }

    pub fn withdrawal(source: AccountId, amount: Decimal, title: impl Into<String>) -> Self {
        Self::new(TransactionType::Withdrawal, Some(source), None, amount, title)
    }

    pub fn transfer(
        transaction_type: TransactionType,
        source: AccountId,
        destination: AccountId,
        amount: Decimal,
        title: impl Into<String>,
    ) -> Self {
        Self::new(transaction_type, Some(source), Some(destination), amount, title)
    }

    /// Fee debited from `source`; destination resolves to the house account
    /// at execution time.
    pub fn fee(source: AccountId, amount: Decimal, title: impl Into<String>) -> Self {
        Self::new(TransactionType::Fee, Some(source), None, amount, title)
    }

    /// Distinct account ids referenced by this transaction, ascending
    pub fn account_ids(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self.source.into_iter().chain(self.destination).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn involves(&self, account_id: AccountId) -> bool {
        self.source == Some(account_id) || self.destination == Some(account_id)
    }

    /// Deletion is allowed while NEW or when the status was never set
    pub fn is_deletable(&self) -> bool {
        matches!(self.status, None | Some(TransactionStatus::New))
    }

    pub fn status_str(&self) -> &'static str {
        self.status.map(|s| s.as_str()).unwrap_or("UNSET")
    }
}
