//! Transaction repository port and in-memory adapter

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;

use super::error::TransactionError;
use super::state::TransactionStatus;
use super::types::Transaction;
use crate::core_types::{AccountId, TransactionId};

pub trait TransactionRepository: Send + Sync {
    fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, TransactionError>;

    /// Replace a stored transaction
    fn save(&self, tx: &Transaction) -> Result<(), TransactionError>;

    /// Store a new transaction, assigning its id
    fn insert(&self, tx: Transaction) -> Result<Transaction, TransactionError>;

    /// Atomically move `id` from `expected` to `next`.
    ///
    /// Returns the updated record, or `None` if the stored status was not
    /// `expected` (another caller got there first).
    fn transition(
        &self,
        id: TransactionId,
        expected: Option<TransactionStatus>,
        next: TransactionStatus,
    ) -> Result<Option<Transaction>, TransactionError>;

    /// Ordered by id
    fn find_by_status(
        &self,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>, TransactionError>;

    /// Transactions with `account_id` as source or destination, ordered by id
    fn find_by_account(&self, account_id: AccountId)
    -> Result<Vec<Transaction>, TransactionError>;

    /// Ordered by id
    fn find_all(&self) -> Result<Vec<Transaction>, TransactionError>;

    /// Remove `id` only if `allowed` holds for the stored record, checked
    /// under the same entry lock as the removal.
    ///
    /// Returns whether a record was removed.
    fn delete_if(
        &self,
        id: TransactionId,
        allowed: &dyn Fn(&Transaction) -> bool,
    ) -> Result<bool, TransactionError>;
}

/// In-memory [`TransactionRepository`] backed by `DashMap`
#[derive(Debug)]
pub struct InMemoryTransactionRepository {
    transactions: DashMap<TransactionId, Transaction>,
    next_id: AtomicU64,
}

impl Default for InMemoryTransactionRepository {
    fn default() -> Self {
        Self {
            transactions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    fn collect_sorted(&self, filter: impl Fn(&Transaction) -> bool) -> Vec<Transaction> {
        let mut out: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|e| filter(e.value()))
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|t| t.id);
        out
    }
}

impl TransactionRepository for InMemoryTransactionRepository {
    fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, TransactionError> {
        Ok(self.transactions.get(&id).map(|e| e.value().clone()))
    }

    fn save(&self, tx: &Transaction) -> Result<(), TransactionError> {
        match self.transactions.get_mut(&tx.id) {
            Some(mut entry) => {
                *entry = tx.clone();
                Ok(())
            }
            None => Err(TransactionError::NotFound(tx.id)),
        }
    }

    fn insert(&self, mut tx: Transaction) -> Result<Transaction, TransactionError> {
        tx.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.transactions.insert(tx.id, tx.clone());
        Ok(tx)
    }

    fn transition(
        &self,
        id: TransactionId,
        expected: Option<TransactionStatus>,
        next: TransactionStatus,
    ) -> Result<Option<Transaction>, TransactionError> {
        let mut entry = self
            .transactions
            .get_mut(&id)
            .ok_or(TransactionError::NotFound(id))?;
        if entry.status != expected {
            return Ok(None);
        }
        entry.status = Some(next);
        entry.updated_at = Utc::now();
        Ok(Some(entry.clone()))
    }

    fn find_by_status(
        &self,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>, TransactionError> {
        Ok(self.collect_sorted(|t| t.status == Some(status)))
    }

    fn find_by_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, TransactionError> {
        Ok(self.collect_sorted(|t| t.involves(account_id)))
    }

    fn find_all(&self) -> Result<Vec<Transaction>, TransactionError> {
        Ok(self.collect_sorted(|_| true))
    }

    fn delete_if(
        &self,
        id: TransactionId,
        allowed: &dyn Fn(&Transaction) -> bool,
    ) -> Result<bool, TransactionError> {
        Ok(self
            .transactions
            .remove_if(&id, |_, tx| allowed(tx))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let repo = InMemoryTransactionRepository::new();
        let a = repo.insert(Transaction::deposit(1, Decimal::ONE, "a")).unwrap();
        let b = repo.insert(Transaction::deposit(2, Decimal::ONE, "b")).unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(repo.find_by_id(2).unwrap().unwrap().title, "b");
        assert!(repo.find_by_id(3).unwrap().is_none());
    }

    #[test]
    fn test_transition_is_compare_and_set() {
        let repo = InMemoryTransactionRepository::new();
        let tx = repo.insert(Transaction::deposit(1, Decimal::ONE, "a")).unwrap();

        let claimed = repo
            .transition(tx.id, Some(TransactionStatus::New), TransactionStatus::Pending)
            .unwrap();
        assert_eq!(claimed.unwrap().status, Some(TransactionStatus::Pending));

        // second claim loses
        let again = repo
            .transition(tx.id, Some(TransactionStatus::New), TransactionStatus::Pending)
            .unwrap();
        assert!(again.is_none());

        assert!(matches!(
            repo.transition(99, None, TransactionStatus::Pending),
            Err(TransactionError::NotFound(99))
        ));
    }

    #[test]
    fn test_queries() {
        let repo = InMemoryTransactionRepository::new();
        repo.insert(Transaction::deposit(1, Decimal::ONE, "a")).unwrap();
        let mut done = repo.insert(Transaction::withdrawal(2, Decimal::ONE, "b")).unwrap();
        repo.insert(Transaction::transfer(
            crate::transaction::TransactionType::TransferInternal,
            1,
            2,
            Decimal::ONE,
            "c",
        ))
        .unwrap();

        done.status = Some(TransactionStatus::Done);
        repo.save(&done).unwrap();

        let new_ids: Vec<_> = repo
            .find_by_status(TransactionStatus::New)
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(new_ids, vec![1, 3]);

        let for_two: Vec<_> = repo.find_by_account(2).unwrap().iter().map(|t| t.id).collect();
        assert_eq!(for_two, vec![2, 3]);
        assert_eq!(repo.find_all().unwrap().len(), 3);

        assert!(repo.delete_if(1, &|_| true).unwrap());
        assert!(!repo.delete_if(1, &|_| true).unwrap());
        assert_eq!(repo.len(), 2);
    }

    #[test]
    fn test_delete_if_checks_stored_record() {
        let repo = InMemoryTransactionRepository::new();
        let tx = repo.insert(Transaction::deposit(1, Decimal::ONE, "a")).unwrap();
        repo.transition(tx.id, Some(TransactionStatus::New), TransactionStatus::Pending)
            .unwrap();

        assert!(!repo.delete_if(tx.id, &Transaction::is_deletable).unwrap());
        assert!(repo.find_by_id(tx.id).unwrap().is_some());
    }

    #[test]
    fn test_save_unknown_is_not_found() {
        let repo = InMemoryTransactionRepository::new();
        let mut tx = Transaction::deposit(1, Decimal::ONE, "a");
        tx.id = 42;
        assert_eq!(repo.save(&tx), Err(TransactionError::NotFound(42)));
    }
}
