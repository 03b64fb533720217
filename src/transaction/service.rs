//! Transaction Service
//!
//! Public facade: registration, single and batch processing, IBAN transfers,
//! queries and deletion.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_queue::ArrayQueue;
use rust_decimal::{Decimal, RoundingStrategy};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::classifier::ErrorClassifier;
use super::coordinator::TransactionLifecycleCoordinator;
use super::error::{FailureKind, TransactionError};
use super::observer::TransactionObserver;
use super::repository::TransactionRepository;
use super::state::TransactionStatus;
use super::types::Transaction;
use crate::account::{Account, AccountError, AccountProvider};
use crate::core_types::{AccountId, HOUSE_ACCOUNT_ID, TransactionId};
use crate::iban::{IbanAnalyzer, IbanGenerator};
use crate::locking::{
    AccountLockCoordinator, CancellationSignal, LockRegistry, LockStatsSnapshot, LockingConfig,
};

/// Engine tunables (the `engine` section of the YAML config)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Account credited by FEE transactions without a destination
    pub house_account_id: AccountId,
    /// Worker threads for `process_all_new_parallel`
    pub worker_threads: usize,
    /// Register a FEE alongside IBAN transfers whose type carries a fee rate
    pub charge_transfer_fees: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            house_account_id: HOUSE_ACCOUNT_ID,
            worker_threads: 4,
            charge_transfer_fees: true,
        }
    }
}

/// Outcome counts of a batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// NEW transactions in the snapshot
    pub total: usize,
    pub done: usize,
    /// Ended in a failure status
    pub failed: usize,
    /// Not processed: claimed elsewhere, deleted meanwhile, or cancelled
    pub skipped: usize,
    pub by_status: FxHashMap<TransactionStatus, usize>,
    pub elapsed_ms: u64,
}

impl BatchReport {
    /// Count by the status actually stored. `recorded` is only consulted for
    /// errors: a failure after DONE was persisted (lock release) still counts
    /// as done.
    fn record(
        &mut self,
        result: &Result<Transaction, TransactionError>,
        recorded: impl FnOnce() -> Option<TransactionStatus>,
    ) {
        let status = match result {
            Ok(_) => TransactionStatus::Done,
            Err(e) if e.kind() == FailureKind::Request => {
                self.skipped += 1;
                return;
            }
            Err(e) => recorded()
                .filter(|s| s.is_terminal())
                .unwrap_or_else(|| ErrorClassifier::classify(e)),
        };
        if status == TransactionStatus::Done {
            self.done += 1;
        } else {
            self.failed += 1;
        }
        *self.by_status.entry(status).or_default() += 1;
    }

    fn accounted(&self) -> usize {
        self.done + self.failed + self.skipped
    }

    fn merge(&mut self, other: BatchReport) {
        self.done += other.done;
        self.failed += other.failed;
        self.skipped += other.skipped;
        for (status, n) in other.by_status {
            *self.by_status.entry(status).or_default() += n;
        }
    }

    pub fn count(&self, status: TransactionStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Batch: total={}, done={}, failed={}, skipped={}, elapsed={}ms",
            self.total, self.done, self.failed, self.skipped, self.elapsed_ms
        )
    }
}

/// Transactions created by [`TransactionService::register_iban_transfer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IbanTransfer {
    pub transfer: Transaction,
    pub fee: Option<Transaction>,
}

pub struct TransactionService {
    coordinator: TransactionLifecycleCoordinator,
    accounts: Arc<dyn AccountProvider>,
    transactions: Arc<dyn TransactionRepository>,
    analyzer: IbanAnalyzer,
    config: EngineConfig,
}

impl TransactionService {
    /// Build the service with its own lock registry and make sure the house
    /// account exists.
    pub fn new(
        accounts: Arc<dyn AccountProvider>,
        transactions: Arc<dyn TransactionRepository>,
        locking: LockingConfig,
        config: EngineConfig,
    ) -> Result<Self, TransactionError> {
        let locks = Arc::new(AccountLockCoordinator::new(
            Arc::new(LockRegistry::new()),
            locking,
        ));
        Self::with_locks(accounts, transactions, locks, config)
    }

    /// Build the service around an existing lock coordinator
    pub fn with_locks(
        accounts: Arc<dyn AccountProvider>,
        transactions: Arc<dyn TransactionRepository>,
        locks: Arc<AccountLockCoordinator>,
        config: EngineConfig,
    ) -> Result<Self, TransactionError> {
        let coordinator = TransactionLifecycleCoordinator::new(
            locks,
            Arc::clone(&accounts),
            Arc::clone(&transactions),
        )
        .with_house_account(config.house_account_id);

        let service = Self {
            coordinator,
            accounts,
            transactions,
            analyzer: IbanAnalyzer::new(),
            config,
        };
        service.ensure_house_account()?;
        Ok(service)
    }

    fn ensure_house_account(&self) -> Result<(), TransactionError> {
        let id = self.config.house_account_id;
        match self.accounts.get_by_id(id) {
            Ok(_) => Ok(()),
            Err(AccountError::NotFound(_)) => {
                let iban = IbanGenerator::default().generate(0, 0)?;
                self.accounts
                    .save(Account::new(id, 0, iban.to_string(), Decimal::ZERO)?)?;
                info!(account_id = id, iban = %iban.masked(), "House account created");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn register_observer(&mut self, observer: Arc<dyn TransactionObserver>) {
        self.coordinator.register_observer(observer);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn accounts(&self) -> &Arc<dyn AccountProvider> {
        &self.accounts
    }

    pub fn lock_stats(&self) -> LockStatsSnapshot {
        self.coordinator.locks().stats()
    }

    pub fn signal(&self) -> &CancellationSignal {
        self.coordinator.locks().signal()
    }

    // ============================================================
    // REGISTRATION
    // ============================================================

    /// Check the transaction's shape and store it as NEW without executing it
    pub fn register_transaction(&self, mut tx: Transaction) -> Result<Transaction, TransactionError> {
        self.coordinator.validator().validate_shape(&tx)?;

        let now = chrono::Utc::now();
        tx.status = Some(TransactionStatus::New);
        tx.created_at = now;
        tx.updated_at = now;

        let tx = self.transactions.insert(tx)?;
        info!(
            tx_id = tx.id,
            tx_type = tx.transaction_type.map(|t| t.as_str()).unwrap_or("UNSET"),
            amount = %tx.amount.unwrap_or_default(),
            "Transaction registered"
        );
        Ok(tx)
    }

    /// Register a transfer addressed by IBANs.
    ///
    /// The tier (OWN / INTERNAL / EXTERNAL) is derived from the IBANs. When
    /// fees are enabled and the tier has a fee rate, a FEE debiting the source
    /// is registered too (rounded half-up to cents).
    pub fn register_iban_transfer(
        &self,
        source_iban: &str,
        destination_iban: &str,
        amount: Decimal,
        title: &str,
    ) -> Result<IbanTransfer, TransactionError> {
        let category = self.analyzer.classify_raw(source_iban, destination_iban)?;
        let source = self.accounts.get_by_iban(source_iban)?;
        let destination = self.accounts.get_by_iban(destination_iban)?;
        let tx_type = category.transaction_type();

        let transfer = self.register_transaction(Transaction::transfer(
            tx_type,
            source.id(),
            destination.id(),
            amount,
            title,
        ))?;

        let fee_amount = (amount * tx_type.fee_rate())
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let fee = if self.config.charge_transfer_fees && fee_amount > Decimal::ZERO {
            let fee = self.register_transaction(Transaction::fee(
                source.id(),
                fee_amount,
                format!("Fee for transaction {}", transfer.id),
            ))?;
            debug!(tx_id = transfer.id, fee_tx_id = fee.id, %fee_amount, "Transfer fee registered");
            Some(fee)
        } else {
            None
        };

        Ok(IbanTransfer { transfer, fee })
    }

    // ============================================================
    // PROCESSING
    // ============================================================

    pub fn process_transaction_by_id(&self, id: TransactionId) -> Result<Transaction, TransactionError> {
        self.coordinator.process(id)
    }

    /// Process every NEW transaction in id order, one at a time.
    ///
    /// Individual failures never stop the batch; cancellation does (the rest
    /// are reported as skipped).
    pub fn process_all_new(&self) -> Result<BatchReport, TransactionError> {
        let start = Instant::now();
        let ids = self.new_transaction_ids()?;
        let mut report = BatchReport {
            total: ids.len(),
            ..Default::default()
        };

        for id in ids {
            if self.signal().is_cancelled() {
                report.skipped += 1;
                continue;
            }
            self.process_into(&mut report, id);
        }

        report.elapsed_ms = start.elapsed().as_millis() as u64;
        self.log_report(&report);
        Ok(report)
    }

    /// [`TransactionService::process_all_new`] fanned out over `workers`
    /// threads. Ordering between transactions is not preserved; transactions
    /// sharing accounts still serialize on the account locks.
    pub fn process_all_new_parallel(&self, workers: usize) -> Result<BatchReport, TransactionError> {
        let start = Instant::now();
        let ids = self.new_transaction_ids()?;
        let mut report = BatchReport {
            total: ids.len(),
            ..Default::default()
        };
        if ids.is_empty() {
            return Ok(report);
        }

        let queue = ArrayQueue::new(ids.len());
        for id in ids {
            // capacity equals the number of ids
            let _ = queue.push(id);
        }

        let workers = workers.clamp(1, queue.len());
        let queue = &queue;
        let partials: Vec<Option<BatchReport>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(move || {
                        let mut local = BatchReport::default();
                        while let Some(id) = queue.pop() {
                            if self.signal().is_cancelled() {
                                local.skipped += 1;
                                continue;
                            }
                            self.process_into(&mut local, id);
                        }
                        local
                    })
                })
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(worker, h)| match h.join() {
                    Ok(local) => Some(local),
                    Err(_) => {
                        error!(worker, "Batch worker panicked, its results are lost");
                        None
                    }
                })
                .collect()
        });

        for partial in partials.into_iter().flatten() {
            report.merge(partial);
        }
        if report.accounted() < report.total {
            let lost = report.total - report.accounted();
            error!(lost, "Transactions without an outcome counted as skipped");
            report.skipped += lost;
        }
        report.elapsed_ms = start.elapsed().as_millis() as u64;
        self.log_report(&report);
        Ok(report)
    }

    fn process_into(&self, report: &mut BatchReport, id: TransactionId) {
        let result = self.coordinator.process(id);
        report.record(&result, || {
            self.transactions
                .find_by_id(id)
                .ok()
                .flatten()
                .and_then(|tx| tx.status)
        });
    }

    fn new_transaction_ids(&self) -> Result<Vec<TransactionId>, TransactionError> {
        Ok(self
            .transactions
            .find_by_status(TransactionStatus::New)?
            .into_iter()
            .map(|t| t.id)
            .collect())
    }

    fn log_report(&self, report: &BatchReport) {
        if report.failed > 0 || report.skipped > 0 {
            warn!(
                total = report.total,
                done = report.done,
                failed = report.failed,
                skipped = report.skipped,
                elapsed_ms = report.elapsed_ms,
                "Batch finished with failures"
            );
        } else {
            info!(
                total = report.total,
                done = report.done,
                elapsed_ms = report.elapsed_ms,
                "Batch finished"
            );
        }
    }

    /// Stop batch processing and abort lock waits
    pub fn shutdown(&self) {
        info!("Shutdown requested, cancelling lock waits");
        self.signal().cancel();
    }

    // ============================================================
    // QUERIES
    // ============================================================

    pub fn get_transaction(&self, id: TransactionId) -> Result<Transaction, TransactionError> {
        self.transactions
            .find_by_id(id)?
            .ok_or(TransactionError::NotFound(id))
    }

    pub fn transactions_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<Transaction>, TransactionError> {
        self.transactions.find_by_account(account_id)
    }

    /// Newest first
    pub fn recent_transactions(
        &self,
        account_id: AccountId,
        limit: usize,
    ) -> Result<Vec<Transaction>, TransactionError> {
        let mut txs = self.transactions.find_by_account(account_id)?;
        txs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        txs.truncate(limit);
        Ok(txs)
    }

    pub fn all_transactions(&self) -> Result<Vec<Transaction>, TransactionError> {
        self.transactions.find_all()
    }

    /// Delete a transaction that was never processed (NEW or unset).
    ///
    /// The status check and the removal happen atomically in the repository,
    /// so a concurrent claim wins over the delete.
    pub fn delete_transaction(&self, id: TransactionId) -> Result<(), TransactionError> {
        if self.transactions.delete_if(id, &Transaction::is_deletable)? {
            info!(tx_id = id, "Transaction deleted");
            return Ok(());
        }
        let tx = self.get_transaction(id)?;
        warn!(tx_id = id, status = tx.status_str(), "Refusing to delete processed transaction");
        Err(TransactionError::DeletionForbidden {
            id,
            status: tx.status_str().to_string(),
        })
    }
}
