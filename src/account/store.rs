//! Account provider
//!
//! The engine reads and mutates balances only through [`AccountProvider`].
//! Callers must hold the account's resource lock before calling `credit` or
//! `debit`; the provider itself does not serialize multi-step operations.

use dashmap::DashMap;
use rust_decimal::Decimal;

use super::error::AccountError;
use super::models::Account;
use crate::core_types::AccountId;
use crate::iban::mask_raw;

/// Account storage port
pub trait AccountProvider: Send + Sync {
    /// Snapshot of the account
    fn get_by_id(&self, id: AccountId) -> Result<Account, AccountError>;

    /// Snapshot of the account owning `iban` (any spacing/case)
    fn get_by_iban(&self, iban: &str) -> Result<Account, AccountError>;

    /// Add funds; returns the updated snapshot
    fn credit(&self, id: AccountId, amount: Decimal) -> Result<Account, AccountError>;

    /// Remove funds; returns the updated snapshot
    fn debit(&self, id: AccountId, amount: Decimal) -> Result<Account, AccountError>;

    /// Insert or replace an account
    fn save(&self, account: Account) -> Result<(), AccountError>;
}

/// In-memory [`AccountProvider`] backed by `DashMap`
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: DashMap<AccountId, Account>,
    by_iban: DashMap<String, AccountId>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let store = Self::new();
        for account in accounts {
            store.insert(account);
        }
        store
    }

    fn insert(&self, account: Account) {
        if let Some(previous) = self.accounts.get(&account.id()) {
            self.by_iban.remove(&normalize_iban(previous.iban()));
        }
        self.by_iban
            .insert(normalize_iban(account.iban()), account.id());
        self.accounts.insert(account.id(), account);
    }

    /// All accounts, ordered by id
    pub fn all(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self.accounts.iter().map(|e| e.value().clone()).collect();
        accounts.sort_by_key(Account::id);
        accounts
    }

    /// Sum of all balances
    pub fn total_balance(&self) -> Decimal {
        self.accounts.iter().map(|e| e.value().balance()).sum()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn mutate(
        &self,
        id: AccountId,
        op: impl FnOnce(&mut Account) -> Result<(), AccountError>,
    ) -> Result<Account, AccountError> {
        let mut entry = self
            .accounts
            .get_mut(&id)
            .ok_or(AccountError::NotFound(id))?;
        op(entry.value_mut())?;
        Ok(entry.value().clone())
    }
}

impl AccountProvider for InMemoryAccountStore {
    fn get_by_id(&self, id: AccountId) -> Result<Account, AccountError> {
        self.accounts
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(AccountError::NotFound(id))
    }

    fn get_by_iban(&self, iban: &str) -> Result<Account, AccountError> {
        let id = self
            .by_iban
            .get(&normalize_iban(iban))
            .map(|e| *e.value())
            .ok_or_else(|| AccountError::IbanNotFound {
                masked: mask_raw(iban),
            })?;
        self.get_by_id(id)
    }

    fn credit(&self, id: AccountId, amount: Decimal) -> Result<Account, AccountError> {
        self.mutate(id, |account| account.credit(amount))
    }

    fn debit(&self, id: AccountId, amount: Decimal) -> Result<Account, AccountError> {
        self.mutate(id, |account| account.debit(amount))
    }

    fn save(&self, account: Account) -> Result<(), AccountError> {
        self.insert(account);
        Ok(())
    }
}

fn normalize_iban(iban: &str) -> String {
    iban.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
