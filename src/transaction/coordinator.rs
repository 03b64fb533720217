//! Transaction Lifecycle Coordinator
//!
//! Drives one transaction from NEW to a terminal status:
//!
//! 1. claim: NEW (or unset) → PENDING, compare-and-set in the repository
//! 2. lock every account the strategy names (lower id first)
//! 3. load account snapshots and validate
//! 4. execute the strategy for the transaction type
//! 5. PENDING → DONE, or PENDING → classified failure status
//! 6. release the locks
//!
//! # Safety Invariants
//!
//! 1. **Balanced Locks**: the locks of step 2 are released on every exit path.
//!    Explicit release reports errors; the guard's `Drop` covers panics.
//! 2. **Terminal Is Final**: a terminal status is never overwritten, not even
//!    when releasing the locks fails after DONE was recorded.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use super::classifier::ErrorClassifier;
use super::error::TransactionError;
use super::observer::{LoggingObserver, Observers, TransactionObserver};
use super::repository::TransactionRepository;
use super::state::TransactionStatus;
use super::strategy::{ExecutionContext, StrategyRegistry};
use super::types::Transaction;
use super::validator::{TransactionValidator, ValidationInput};
use crate::account::{Account, AccountError, AccountProvider};
use crate::core_types::{AccountId, HOUSE_ACCOUNT_ID, TransactionId};
use crate::locking::AccountLockCoordinator;

pub struct TransactionLifecycleCoordinator {
    locks: Arc<AccountLockCoordinator>,
    accounts: Arc<dyn AccountProvider>,
    transactions: Arc<dyn TransactionRepository>,
    validator: TransactionValidator,
    observers: Observers,
    house_account_id: AccountId,
}

impl TransactionLifecycleCoordinator {
    /// Create a coordinator with the [`LoggingObserver`] registered
    pub fn new(
        locks: Arc<AccountLockCoordinator>,
        accounts: Arc<dyn AccountProvider>,
        transactions: Arc<dyn TransactionRepository>,
    ) -> Self {
        let mut observers = Observers::new();
        observers.register(Arc::new(LoggingObserver));
        Self {
            locks,
            accounts,
            transactions,
            validator: TransactionValidator::new(),
            observers,
            house_account_id: HOUSE_ACCOUNT_ID,
        }
    }

    pub fn with_house_account(mut self, house_account_id: AccountId) -> Self {
        self.house_account_id = house_account_id;
        self
    }

    pub fn register_observer(&mut self, observer: Arc<dyn TransactionObserver>) {
        self.observers.register(observer);
    }

    pub fn locks(&self) -> &Arc<AccountLockCoordinator> {
        &self.locks
    }

    pub fn house_account_id(&self) -> AccountId {
        self.house_account_id
    }

    pub fn validator(&self) -> &TransactionValidator {
        &self.validator
    }

    /// Run the full lifecycle for transaction `id`.
    ///
    /// Returns the DONE transaction, or the failure that ended it. Business
    /// failures have already been recorded as a terminal status when the
    /// error is returned; request errors (`NotFound`, `InvalidState`,
    /// `AlreadyProcessed`) leave the record untouched.
    pub fn process(&self, id: TransactionId) -> Result<Transaction, TransactionError> {
        let tx = self
            .transactions
            .find_by_id(id)?
            .ok_or(TransactionError::NotFound(id))?;
        let tx = self.claim(tx)?;
        self.run_claimed(tx)
    }

    /// NEW or unset → PENDING
    fn claim(&self, tx: Transaction) -> Result<Transaction, TransactionError> {
        if let Err(e) = ensure_processable(&tx) {
            self.observers.failure(&tx, &e, None);
            return Err(e);
        }

        let from = tx.status;
        match self
            .transactions
            .transition(tx.id, from, TransactionStatus::Pending)?
        {
            Some(claimed) => {
                self.observers
                    .status_changed(&claimed, from, TransactionStatus::Pending);
                Ok(claimed)
            }
            None => {
                // another caller claimed it between our read and the CAS
                let current = self
                    .transactions
                    .find_by_id(tx.id)?
                    .ok_or(TransactionError::NotFound(tx.id))?;
                let e = ensure_processable(&current)
                    .err()
                    .unwrap_or_else(|| TransactionError::InvalidState {
                        id: tx.id,
                        status: current.status_str().to_string(),
                    });
                self.observers.failure(&current, &e, None);
                Err(e)
            }
        }
    }

    fn run_claimed(&self, mut tx: Transaction) -> Result<Transaction, TransactionError> {
        let (from, to) = match tx.transaction_type {
            Some(t) => StrategyRegistry::get(t).lock_targets(&tx, self.house_account_id),
            None => (tx.source, tx.destination),
        };

        let guard = match self.locks.acquire(from, to) {
            Ok(guard) => guard,
            Err(e) => return Err(self.fail(&mut tx, e.into())),
        };
        debug!(tx_id = tx.id, accounts = ?guard.accounts(), "Account locks held");

        let outcome = self
            .execute_locked(&mut tx)
            .and_then(|()| self.record(&mut tx, TransactionStatus::Done));

        match outcome {
            Ok(()) => {
                if let Err(e) = guard.release() {
                    let e = TransactionError::from(e);
                    error!(tx_id = tx.id, error = %e, "Lock release failed after commit");
                    self.observers.failure(&tx, &e, None);
                    return Err(e);
                }
                info!(
                    tx_id = tx.id,
                    tx_type = tx.transaction_type.map(|t| t.as_str()).unwrap_or("UNSET"),
                    "Transaction completed"
                );
                Ok(tx)
            }
            Err(e) => {
                let e = self.fail(&mut tx, e);
                if let Err(release_err) = guard.release() {
                    let release_err = TransactionError::from(release_err);
                    error!(tx_id = tx.id, error = %release_err, "Lock release failed after failure");
                    self.observers.failure(&tx, &release_err, None);
                }
                Err(e)
            }
        }
    }

    /// Steps 3 and 4; requires the locks to be held
    fn execute_locked(&self, tx: &mut Transaction) -> Result<(), TransactionError> {
        let source = self.load_account(tx.source)?;
        let destination = self.load_account(tx.destination)?;
        self.validator.validate(&ValidationInput::new(
            tx,
            source.as_ref(),
            destination.as_ref(),
        ))?;

        let tx_type = tx
            .transaction_type
            .ok_or_else(|| TransactionError::Validation("transaction type is missing".into()))?;
        let ctx = ExecutionContext {
            accounts: self.accounts.as_ref(),
            transactions: self.transactions.as_ref(),
            house_account_id: self.house_account_id,
        };
        StrategyRegistry::get(tx_type).execute(tx, &ctx)
    }

    /// A missing account is `None` (the validator rejects it); other lookup
    /// failures are errors.
    fn load_account(&self, id: Option<AccountId>) -> Result<Option<Account>, TransactionError> {
        let Some(id) = id else {
            return Ok(None);
        };
        match self.accounts.get_by_id(id) {
            Ok(account) => Ok(Some(account)),
            Err(AccountError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Record the classified failure status and notify. Returns `err`.
    fn fail(&self, tx: &mut Transaction, err: TransactionError) -> TransactionError {
        let status = ErrorClassifier::classify(&err);
        let recorded = match self.record(tx, status) {
            Ok(()) => Some(status),
            Err(record_err) => {
                error!(
                    tx_id = tx.id,
                    status = status.as_str(),
                    error = %record_err,
                    "Failed to record failure status"
                );
                None
            }
        };
        self.observers.failure(tx, &err, recorded);
        err
    }

    /// Apply a checked status transition and persist it
    fn record(&self, tx: &mut Transaction, to: TransactionStatus) -> Result<(), TransactionError> {
        let from = tx.status;
        if !from.is_none_or(|s| s.can_transition_to(to)) {
            return Err(TransactionError::InvalidState {
                id: tx.id,
                status: tx.status_str().to_string(),
            });
        }

        let previous_updated_at = tx.updated_at;
        tx.status = Some(to);
        tx.updated_at = Utc::now();
        if let Err(e) = self.transactions.save(tx) {
            tx.status = from;
            tx.updated_at = previous_updated_at;
            return Err(e);
        }
        self.observers.status_changed(tx, from, to);
        Ok(())
    }
}

fn ensure_processable(tx: &Transaction) -> Result<(), TransactionError> {
    match tx.status {
        None | Some(TransactionStatus::New) => Ok(()),
        Some(TransactionStatus::Pending) => Err(TransactionError::InvalidState {
            id: tx.id,
            status: TransactionStatus::Pending.as_str().to_string(),
        }),
        Some(status) => Err(TransactionError::AlreadyProcessed { id: tx.id, status }),
    }
}
