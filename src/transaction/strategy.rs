//! Execution strategies
//!
//! One balance-mutation routine per [`TransactionType`]. Strategies assume
//! the lifecycle coordinator already holds every lock named by
//! [`ExecutionStrategy::lock_targets`]; they never lock anything themselves.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, error};

use super::error::TransactionError;
use super::repository::TransactionRepository;
use super::types::{Transaction, TransactionType};
use crate::account::AccountProvider;
use crate::core_types::AccountId;

/// Collaborators available to a strategy
pub struct ExecutionContext<'a> {
    pub accounts: &'a dyn AccountProvider,
    pub transactions: &'a dyn TransactionRepository,
    pub house_account_id: AccountId,
}

pub trait ExecutionStrategy: Send + Sync {
    fn transaction_type(&self) -> TransactionType;

    /// Accounts that must be locked before `execute` runs
    fn lock_targets(
        &self,
        tx: &Transaction,
        _house_account_id: AccountId,
    ) -> (Option<AccountId>, Option<AccountId>) {
        (tx.source, tx.destination)
    }

    fn execute(&self, tx: &mut Transaction, ctx: &ExecutionContext<'_>)
    -> Result<(), TransactionError>;
}

// ============================================================================
// Strategies
// ============================================================================

pub struct DepositStrategy;

impl ExecutionStrategy for DepositStrategy {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::Deposit
    }

    fn execute(
        &self,
        tx: &mut Transaction,
        ctx: &ExecutionContext<'_>,
    ) -> Result<(), TransactionError> {
        let amount = required_amount(tx)?;
        let destination = required_account(tx.destination, "destination")?;
        let after = ctx.accounts.credit(destination, amount)?;
        debug!(tx_id = tx.id, account_id = destination, balance = %after.balance(), "Deposit applied");
        Ok(())
    }
}

pub struct WithdrawalStrategy;

impl ExecutionStrategy for WithdrawalStrategy {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::Withdrawal
    }

    fn execute(
        &self,
        tx: &mut Transaction,
        ctx: &ExecutionContext<'_>,
    ) -> Result<(), TransactionError> {
        let amount = required_amount(tx)?;
        let source = required_account(tx.source, "source")?;
        let after = ctx.accounts.debit(source, amount)?;
        debug!(tx_id = tx.id, account_id = source, balance = %after.balance(), "Withdrawal applied");
        Ok(())
    }
}

/// Shared by the three transfer tiers; the tier only matters upstream
/// (fees, audit).
pub struct TransferStrategy {
    kind: TransactionType,
}

impl TransferStrategy {
    pub const fn new(kind: TransactionType) -> Self {
        Self { kind }
    }
}

impl ExecutionStrategy for TransferStrategy {
    fn transaction_type(&self) -> TransactionType {
        self.kind
    }

    fn execute(
        &self,
        tx: &mut Transaction,
        ctx: &ExecutionContext<'_>,
    ) -> Result<(), TransactionError> {
        let amount = required_amount(tx)?;
        let source = required_account(tx.source, "source")?;
        let destination = required_account(tx.destination, "destination")?;
        move_funds(tx, ctx, source, destination, amount)
    }
}

/// Debit source, credit destination. The destination defaults to the house
/// account; the resolution is persisted before any money moves so a retry
/// sees the same destination.
pub struct FeeStrategy;

impl ExecutionStrategy for FeeStrategy {
    fn transaction_type(&self) -> TransactionType {
        TransactionType::Fee
    }

    fn lock_targets(
        &self,
        tx: &Transaction,
        house_account_id: AccountId,
    ) -> (Option<AccountId>, Option<AccountId>) {
        (tx.source, Some(tx.destination.unwrap_or(house_account_id)))
    }

    fn execute(
        &self,
        tx: &mut Transaction,
        ctx: &ExecutionContext<'_>,
    ) -> Result<(), TransactionError> {
        let amount = required_amount(tx)?;
        let source = required_account(tx.source, "source")?;

        let destination = match tx.destination {
            Some(id) => id,
            None => {
                tx.destination = Some(ctx.house_account_id);
                tx.updated_at = Utc::now();
                ctx.transactions.save(tx)?;
                debug!(tx_id = tx.id, account_id = ctx.house_account_id, "Fee destination resolved to house account");
                ctx.house_account_id
            }
        };

        move_funds(tx, ctx, source, destination, amount)
    }
}

// ============================================================================
// Registry
// ============================================================================

static DEPOSIT: DepositStrategy = DepositStrategy;
static WITHDRAWAL: WithdrawalStrategy = WithdrawalStrategy;
static TRANSFER_OWN: TransferStrategy = TransferStrategy::new(TransactionType::TransferOwn);
static TRANSFER_INTERNAL: TransferStrategy =
    TransferStrategy::new(TransactionType::TransferInternal);
static TRANSFER_EXTERNAL: TransferStrategy =
    TransferStrategy::new(TransactionType::TransferExternal);
static FEE: FeeStrategy = FeeStrategy;

/// Static dispatch table keyed by transaction type
pub struct StrategyRegistry;

impl StrategyRegistry {
    pub fn get(transaction_type: TransactionType) -> &'static dyn ExecutionStrategy {
        match transaction_type {
            TransactionType::Deposit => &DEPOSIT,
            TransactionType::Withdrawal => &WITHDRAWAL,
            TransactionType::TransferOwn => &TRANSFER_OWN,
            TransactionType::TransferInternal => &TRANSFER_INTERNAL,
            TransactionType::TransferExternal => &TRANSFER_EXTERNAL,
            TransactionType::Fee => &FEE,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn required_amount(tx: &Transaction) -> Result<Decimal, TransactionError> {
    match tx.amount {
        Some(a) if a > Decimal::ZERO => Ok(a),
        _ => Err(TransactionError::Validation(
            "amount must be greater than zero".into(),
        )),
    }
}

fn required_account(id: Option<AccountId>, side: &str) -> Result<AccountId, TransactionError> {
    id.ok_or_else(|| TransactionError::Validation(format!("{side} account is missing")))
}

/// Debit then credit. A failed credit refunds the source so no money is
/// lost; if the refund also fails the inconsistency is logged and reported
/// as unexpected.
fn move_funds(
    tx: &Transaction,
    ctx: &ExecutionContext<'_>,
    source: AccountId,
    destination: AccountId,
    amount: Decimal,
) -> Result<(), TransactionError> {
    ctx.accounts.debit(source, amount)?;

    if let Err(credit_err) = ctx.accounts.credit(destination, amount) {
        return match ctx.accounts.credit(source, amount) {
            Ok(_) => Err(credit_err.into()),
            Err(refund_err) => {
                error!(
                    tx_id = tx.id,
                    source,
                    destination,
                    %amount,
                    credit_error = %credit_err,
                    refund_error = %refund_err,
                    "Refund after failed credit failed"
                );
                Err(TransactionError::Unexpected(format!(
                    "credit to {destination} failed ({credit_err}) and refund to {source} failed ({refund_err})"
                )))
            }
        };
    }

    debug!(tx_id = tx.id, source, destination, %amount, "Funds moved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{Account, AccountError, InMemoryAccountStore};
    use crate::core_types::HOUSE_ACCOUNT_ID;
    use crate::transaction::repository::InMemoryTransactionRepository;

    fn accounts() -> InMemoryAccountStore {
        InMemoryAccountStore::with_accounts([
            Account::new(1, 1, "A", Decimal::from(100)).unwrap(),
            Account::new(2, 2, "B", Decimal::ZERO).unwrap(),
            Account::new(HOUSE_ACCOUNT_ID, 0, "H", Decimal::ZERO).unwrap(),
        ])
    }

    fn ctx<'a>(
        accounts: &'a InMemoryAccountStore,
        repo: &'a InMemoryTransactionRepository,
    ) -> ExecutionContext<'a> {
        ExecutionContext {
            accounts,
            transactions: repo,
            house_account_id: HOUSE_ACCOUNT_ID,
        }
    }

    fn balance(store: &InMemoryAccountStore, id: AccountId) -> Decimal {
        store.get_by_id(id).unwrap().balance()
    }

    #[test]
    fn test_registry_is_exhaustive() {
        for t in TransactionType::ALL {
            assert_eq!(StrategyRegistry::get(t).transaction_type(), t);
        }
    }

    #[test]
    fn test_deposit_and_withdrawal() {
        let store = accounts();
        let repo = InMemoryTransactionRepository::new();
        let ctx = ctx(&store, &repo);

        let mut dep = Transaction::deposit(2, Decimal::from(5), "in");
        StrategyRegistry::get(TransactionType::Deposit)
            .execute(&mut dep, &ctx)
            .unwrap();
        assert_eq!(balance(&store, 2), Decimal::from(5));

        let mut wd = Transaction::withdrawal(1, Decimal::from(30), "out");
        StrategyRegistry::get(TransactionType::Withdrawal)
            .execute(&mut wd, &ctx)
            .unwrap();
        assert_eq!(balance(&store, 1), Decimal::from(70));
    }

    #[test]
    fn test_transfer_rejects_overdraft() {
        let store = accounts();
        let repo = InMemoryTransactionRepository::new();
        let ctx = ctx(&store, &repo);

        let mut tx = Transaction::transfer(TransactionType::TransferInternal, 2, 1, Decimal::ONE, "x");
        let err = StrategyRegistry::get(TransactionType::TransferInternal)
            .execute(&mut tx, &ctx)
            .unwrap_err();
        assert!(matches!(err, TransactionError::InsufficientFunds { account_id: 2, .. }));
        assert_eq!(balance(&store, 1), Decimal::from(100));
        assert_eq!(balance(&store, 2), Decimal::ZERO);
    }

    #[test]
    fn test_transfer_refunds_when_credit_fails() {
        let store = accounts();
        let repo = InMemoryTransactionRepository::new();
        let ctx = ctx(&store, &repo);

        let mut tx = Transaction::transfer(TransactionType::TransferExternal, 1, 77, Decimal::TEN, "x");
        let err = StrategyRegistry::get(TransactionType::TransferExternal)
            .execute(&mut tx, &ctx)
            .unwrap_err();
        assert_eq!(err, TransactionError::from(AccountError::NotFound(77)));
        assert_eq!(balance(&store, 1), Decimal::from(100));
    }

    #[test]
    fn test_fee_resolves_and_persists_house_destination() {
        let store = accounts();
        let repo = InMemoryTransactionRepository::new();
        let mut tx = repo.insert(Transaction::fee(1, Decimal::from(2), "Fee")).unwrap();

        let strategy = StrategyRegistry::get(TransactionType::Fee);
        assert_eq!(
            strategy.lock_targets(&tx, HOUSE_ACCOUNT_ID),
            (Some(1), Some(HOUSE_ACCOUNT_ID))
        );

        strategy.execute(&mut tx, &ctx(&store, &repo)).unwrap();
        assert_eq!(tx.destination, Some(HOUSE_ACCOUNT_ID));
        assert_eq!(
            repo.find_by_id(tx.id).unwrap().unwrap().destination,
            Some(HOUSE_ACCOUNT_ID)
        );
        assert_eq!(balance(&store, 1), Decimal::from(98));
        assert_eq!(balance(&store, HOUSE_ACCOUNT_ID), Decimal::from(2));
    }

    #[test]
    fn test_fee_keeps_explicit_destination() {
        let store = accounts();
        let repo = InMemoryTransactionRepository::new();
        let mut tx = Transaction::fee(1, Decimal::ONE, "Fee");
        tx.destination = Some(2);

        let strategy = StrategyRegistry::get(TransactionType::Fee);
        assert_eq!(strategy.lock_targets(&tx, HOUSE_ACCOUNT_ID), (Some(1), Some(2)));
        // not stored, so a resolution write would fail
        strategy.execute(&mut tx, &ctx(&store, &repo)).unwrap();
        assert_eq!(balance(&store, 2), Decimal::ONE);
    }
}
