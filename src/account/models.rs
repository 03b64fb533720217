//! Account model
//!
//! # Enforcement Strategy:
//! 1. Balance is PRIVATE - only `credit`/`debit` change it
//! 2. All mutations return Result - errors are explicit
//! 3. Version auto-increments on every mutation
//! 4. checked_add/checked_sub - overflow protection

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::AccountError;
use crate::core_types::{AccountId, OwnerId};

/// Bank account
///
/// # Invariants (ENFORCED by private fields):
/// - balance >= 0 after every mutation
/// - version increments on every successful credit/debit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    owner_id: OwnerId,
    iban: String,
    balance: Decimal,
    #[serde(default)]
    version: u64,
}

impl Account {
    /// Create an account with an opening balance
    ///
    /// # Errors
    /// - `InvalidAmount` if the opening balance is negative
    pub fn new(
        id: AccountId,
        owner_id: OwnerId,
        iban: impl Into<String>,
        balance: Decimal,
    ) -> Result<Self, AccountError> {
        if balance < Decimal::ZERO {
            return Err(AccountError::InvalidAmount(balance));
        }
        Ok(Self {
            id,
            owner_id,
            iban: iban.into(),
            balance,
            version: 0,
        })
    }

    // ============================================================
    // READ-ONLY GETTERS
    // ============================================================

    #[inline]
    pub fn id(&self) -> AccountId {
        self.id
    }

    #[inline]
    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    #[inline]
    pub fn iban(&self) -> &str {
        &self.iban
    }

    #[inline]
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether a debit of `amount` would keep the balance non-negative
    pub fn can_cover(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }

    // ============================================================
    // VALIDATED MUTATIONS
    // ============================================================

    /// Add funds
    ///
    /// # Errors
    /// - `InvalidAmount` if amount <= 0
    /// - `Overflow` if the balance cannot represent the result
    pub fn credit(&mut self, amount: Decimal) -> Result<(), AccountError> {
        ensure_positive(amount)?;
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(AccountError::Overflow(self.id))?;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }

    /// Remove funds
    ///
    /// # Errors
    /// - `InvalidAmount` if amount <= 0
    /// - `InsufficientFunds` if amount > balance (balance unchanged)
    pub fn debit(&mut self, amount: Decimal) -> Result<(), AccountError> {
        ensure_positive(amount)?;
        if !self.can_cover(amount) {
            return Err(AccountError::InsufficientFunds {
                account_id: self.id,
                available: self.balance,
                requested: amount,
            });
        }
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or(AccountError::Overflow(self.id))?;
        self.version = self.version.wrapping_add(1);
        Ok(())
    }
}

fn ensure_positive(amount: Decimal) -> Result<(), AccountError> {
    if amount > Decimal::ZERO {
        Ok(())
    } else {
        Err(AccountError::InvalidAmount(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(balance: Decimal) -> Account {
        Account::new(1, 10, "PL00", balance).unwrap()
    }

    #[test]
    fn test_credit_and_debit() {
        let mut a = account(Decimal::from(100));
        a.credit(Decimal::new(2550, 2)).unwrap();
        assert_eq!(a.balance(), Decimal::new(12550, 2));
        a.debit(Decimal::new(12550, 2)).unwrap();
        assert_eq!(a.balance(), Decimal::ZERO);
        assert_eq!(a.version(), 2);
    }

    #[test]
    fn test_debit_insufficient_leaves_balance() {
        let mut a = account(Decimal::from(100));
        let err = a.debit(Decimal::from(150)).unwrap_err();
        assert_eq!(
            err,
            AccountError::InsufficientFunds {
                account_id: 1,
                available: Decimal::from(100),
                requested: Decimal::from(150),
            }
        );
        assert_eq!(a.balance(), Decimal::from(100));
        assert_eq!(a.version(), 0);
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let mut a = account(Decimal::from(10));
        assert!(matches!(a.credit(Decimal::ZERO), Err(AccountError::InvalidAmount(_))));
        assert!(matches!(a.debit(Decimal::from(-1)), Err(AccountError::InvalidAmount(_))));
        assert_eq!(a.balance(), Decimal::from(10));
    }

    #[test]
    fn test_overflow() {
        let mut a = account(Decimal::MAX);
        assert_eq!(a.credit(Decimal::from(1)), Err(AccountError::Overflow(1)));
        assert_eq!(a.balance(), Decimal::MAX);
    }

    #[test]
    fn test_negative_opening_balance() {
        assert!(Account::new(1, 1, "X", Decimal::new(-1, 2)).is_err());
        assert!(Account::new(1, 1, "X", Decimal::ZERO).is_ok());
    }
}
