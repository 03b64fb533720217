//! CSV I/O - Load accounts and transactions, write final state
//!
//! Input files (header row skipped):
//!
//! | File | Columns |
//! |------|---------|
//! | `accounts.csv` | `id,owner_id,iban,balance` |
//! | `transactions.csv` | `type,source,destination,amount,title` |
//! | `iban_transfers.csv` (optional) | `source_iban,destination_iban,amount,title` |
//!
//! Empty `source`/`destination` cells mean "no account". The title is the
//! last column and may itself contain commas.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use rust_decimal::Decimal;
use tracing::info;

use crate::account::Account;
use crate::core_types::AccountId;
use crate::transaction::{Transaction, TransactionType};

// ============================================================
// Constants for file names
// ============================================================

pub const ACCOUNTS_CSV: &str = "accounts.csv";
pub const TRANSACTIONS_CSV: &str = "transactions.csv";
pub const IBAN_TRANSFERS_CSV: &str = "iban_transfers.csv";

pub const BALANCES_FINAL_CSV: &str = "balances_final.csv";
pub const TRANSACTIONS_FINAL_CSV: &str = "transactions_final.csv";

/// Transfer addressed by IBANs, resolved at registration time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IbanTransferRow {
    pub source_iban: String,
    pub destination_iban: String,
    pub amount: Decimal,
    pub title: String,
}

// ============================================================
// Loading
// ============================================================

pub fn load_accounts(path: &Path) -> Result<Vec<Account>> {
    let mut accounts = Vec::new();
    for_each_row(path, 4, |line_no, parts| {
        let id: AccountId = parts[0]
            .parse()
            .with_context(|| format!("Invalid id at line {}", line_no))?;
        let owner_id: u32 = parts[1]
            .parse()
            .with_context(|| format!("Invalid owner_id at line {}", line_no))?;
        let balance = Decimal::from_str(parts[3])
            .with_context(|| format!("Invalid balance at line {}", line_no))?;
        let account = Account::new(id, owner_id, parts[2], balance)
            .with_context(|| format!("Invalid account at line {}", line_no))?;
        accounts.push(account);
        Ok(())
    })?;

    info!(count = accounts.len(), path = %path.display(), "Loaded accounts");
    Ok(accounts)
}

/// Drafts with id 0; the repository assigns ids on registration
pub fn load_transactions(path: &Path) -> Result<Vec<Transaction>> {
    let mut transactions = Vec::new();
    for_each_row(path, 5, |line_no, parts| {
        let tx_type = TransactionType::from_str(parts[0])
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Invalid type at line {}", line_no))?;
        let source = optional_account(parts[1])
            .with_context(|| format!("Invalid source at line {}", line_no))?;
        let destination = optional_account(parts[2])
            .with_context(|| format!("Invalid destination at line {}", line_no))?;
        let amount = Decimal::from_str(parts[3])
            .with_context(|| format!("Invalid amount at line {}", line_no))?;
        transactions.push(Transaction::new(
            tx_type,
            source,
            destination,
            amount,
            parts[4],
        ));
        Ok(())
    })?;

    info!(count = transactions.len(), path = %path.display(), "Loaded transactions");
    Ok(transactions)
}

/// Missing file yields an empty list
pub fn load_iban_transfers(path: &Path) -> Result<Vec<IbanTransferRow>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut rows = Vec::new();
    for_each_row(path, 4, |line_no, parts| {
        let amount = Decimal::from_str(parts[2])
            .with_context(|| format!("Invalid amount at line {}", line_no))?;
        rows.push(IbanTransferRow {
            source_iban: parts[0].to_string(),
            destination_iban: parts[1].to_string(),
            amount,
            title: parts[3].to_string(),
        });
        Ok(())
    })?;

    info!(count = rows.len(), path = %path.display(), "Loaded IBAN transfers");
    Ok(rows)
}

fn optional_account(cell: &str) -> Result<Option<AccountId>> {
    if cell.is_empty() {
        Ok(None)
    } else {
        Ok(Some(cell.parse()?))
    }
}

/// Call `row` with the 1-based line number and exactly `columns` trimmed
/// cells for every non-empty data line.
fn for_each_row(
    path: &Path,
    columns: usize,
    mut row: impl FnMut(usize, &[&str]) -> Result<()>,
) -> Result<()> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let reader = BufReader::new(file);

    for (idx, line) in reader.lines().enumerate().skip(1) {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx + 1;
        let parts: Vec<&str> = line.splitn(columns, ',').map(str::trim).collect();
        if parts.len() < columns {
            bail!(
                "{}: expected {} columns at line {}, got {}",
                path.display(),
                columns,
                line_no,
                parts.len()
            );
        }
        row(line_no, &parts)?;
    }
    Ok(())
}

// ============================================================
// Output Functions
// ============================================================

/// Dump final balances, ordered by account id
pub fn dump_balances(accounts: &[Account], path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "id,owner_id,iban,balance,version")?;
    for account in accounts {
        writeln!(
            out,
            "{},{},{},{},{}",
            account.id(),
            account.owner_id(),
            account.iban(),
            account.balance(),
            account.version()
        )?;
    }
    out.flush()?;

    info!(count = accounts.len(), path = %path.display(), "Dumped balances");
    Ok(())
}

/// Dump every transaction with its final status, ordered as given
pub fn dump_transactions(transactions: &[Transaction], path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "id,type,source,destination,amount,status,title")?;
    for tx in transactions {
        writeln!(
            out,
            "{},{},{},{},{},{},{}",
            tx.id,
            tx.transaction_type.map(|t| t.as_str()).unwrap_or(""),
            cell(tx.source),
            cell(tx.destination),
            tx.amount.map(|a| a.to_string()).unwrap_or_default(),
            tx.status_str(),
            tx.title
        )?;
    }
    out.flush()?;

    info!(count = transactions.len(), path = %path.display(), "Dumped transactions");
    Ok(())
}

fn cell(id: Option<AccountId>) -> String {
    id.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionStatus;
    use std::fs;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_accounts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            ACCOUNTS_CSV,
            "id,owner_id,iban,balance\n1,10,PL61109010140000071219812874,100.50\n\n2,11,DE89370400440532013000,0\n",
        );

        let accounts = load_accounts(&path).unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].balance(), Decimal::new(10050, 2));
        assert_eq!(accounts[1].owner_id(), 11);
    }

    #[test]
    fn test_load_accounts_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, ACCOUNTS_CSV, "id,owner_id,iban,balance\n1,10,X,-5\n");

        let err = load_accounts(&path).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"), "{err:#}");
    }

    #[test]
    fn test_load_transactions() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            TRANSACTIONS_CSV,
            "type,source,destination,amount,title\n\
             DEPOSIT,,2,10,Salary\n\
             TRANSFER_INTERNAL,1,2,2.5,Rent, March\n\
             FEE,1,,1,Monthly fee\n",
        );

        let txs = load_transactions(&path).unwrap();
        assert_eq!(txs.len(), 3);
        assert_eq!(txs[0].source, None);
        assert_eq!(txs[0].destination, Some(2));
        assert_eq!(txs[1].transaction_type, Some(TransactionType::TransferInternal));
        assert_eq!(txs[1].title, "Rent, March");
        assert_eq!(txs[2].amount, Some(Decimal::ONE));
        assert_eq!(txs[2].status, Some(TransactionStatus::New));
    }

    #[test]
    fn test_load_transactions_rejects_unknown_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            TRANSACTIONS_CSV,
            "type,source,destination,amount,title\nREFUND,1,2,1,x\n",
        );
        assert!(load_transactions(&path).is_err());
    }

    #[test]
    fn test_missing_iban_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_iban_transfers(&dir.path().join(IBAN_TRANSFERS_CSV))
            .unwrap()
            .is_empty());
        assert!(load_accounts(&dir.path().join(ACCOUNTS_CSV)).is_err());
    }

    #[test]
    fn test_dump_round_trip_shape() {
        let dir = tempfile::tempdir().unwrap();
        let accounts = vec![Account::new(1, 10, "PL00", Decimal::new(1999, 2)).unwrap()];
        let mut tx = Transaction::fee(1, Decimal::ONE, "Fee");
        tx.id = 7;
        tx.status = Some(TransactionStatus::Done);

        let balances = dir.path().join(BALANCES_FINAL_CSV);
        let statuses = dir.path().join(TRANSACTIONS_FINAL_CSV);
        dump_balances(&accounts, &balances).unwrap();
        dump_transactions(&[tx], &statuses).unwrap();

        let balances = fs::read_to_string(balances).unwrap();
        assert_eq!(balances.lines().nth(1), Some("1,10,PL00,19.99,0"));
        let statuses = fs::read_to_string(statuses).unwrap();
        assert_eq!(statuses.lines().nth(1), Some("7,FEE,1,,1,DONE,Fee"));
    }
}
